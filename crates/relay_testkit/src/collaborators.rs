//! Scripted collaborators.
//!
//! Each implementation answers from a script and records how it was called,
//! so tests can assert both on outcomes and on which collaborators ran.

use async_trait::async_trait;
use parking_lot::Mutex;
use relay_core::{
    CheckRunner, CommandOutput, CoreError, CoreResult, NotificationChannel, NotificationOutcome,
    Prompter, ShellExecutor,
};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A prompter that replays scripted answers.
#[derive(Debug)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<bool>>,
    fallback: bool,
    questions: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    /// Answers every question with `answer`.
    pub fn always(answer: bool) -> Self {
        Self::answers(Vec::new(), answer)
    }

    /// Answers with `answers` in order, then with `fallback`.
    pub fn answers(answers: Vec<bool>, fallback: bool) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            fallback,
            questions: Mutex::new(Vec::new()),
        }
    }

    /// Returns every question asked so far.
    pub fn questions(&self) -> Vec<String> {
        self.questions.lock().clone()
    }

    /// Returns how many times the prompter was asked.
    pub fn asked(&self) -> usize {
        self.questions.lock().len()
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn ask(&self, question: &str) -> bool {
        self.questions.lock().push(question.to_string());
        self.answers.lock().pop_front().unwrap_or(self.fallback)
    }
}

/// A notification channel with a fixed outcome.
#[derive(Debug)]
pub struct ScriptedNotifications {
    outcome: NotificationOutcome,
    hang: bool,
    requests: Mutex<Vec<String>>,
}

impl ScriptedNotifications {
    /// Answers every request with `outcome`.
    pub fn new(outcome: NotificationOutcome) -> Self {
        Self {
            outcome,
            hang: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Never answers, so the caller's timeout fires.
    pub fn hanging() -> Self {
        Self {
            outcome: NotificationOutcome::Timeout,
            hang: true,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Returns the project ids approval was requested for.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl NotificationChannel for ScriptedNotifications {
    async fn request_approval(&self, project_id: &str) -> NotificationOutcome {
        self.requests.lock().push(project_id.to_string());
        if self.hang {
            std::future::pending::<()>().await;
        }
        self.outcome
    }
}

/// A check runner reporting a fixed error count.
#[derive(Debug)]
pub struct FixedCheckRunner {
    count: Option<u32>,
    calls: AtomicUsize,
}

impl FixedCheckRunner {
    /// Reports `count` errors.
    pub fn new(count: u32) -> Self {
        Self {
            count: Some(count),
            calls: AtomicUsize::new(0),
        }
    }

    /// Fails as if the check command could not be started.
    pub fn failing() -> Self {
        Self {
            count: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns how many times the check ran.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CheckRunner for FixedCheckRunner {
    async fn error_count(&self, command: &str, _dir: &Path) -> CoreResult<u32> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.count.ok_or_else(|| CoreError::Command {
            command: command.to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "scripted failure"),
        })
    }
}

/// A shell that records commands and answers from a script.
///
/// Commands without a scripted response exit with code zero.
#[derive(Debug, Default)]
pub struct RecordingShell {
    responses: Mutex<HashMap<String, CommandOutput>>,
    commands: Mutex<Vec<String>>,
}

impl RecordingShell {
    /// Creates a shell where every command succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the output of `command`.
    #[must_use]
    pub fn respond(self, command: &str, output: CommandOutput) -> Self {
        self.responses.lock().insert(command.to_string(), output);
        self
    }

    /// Scripts `command` to exit with `exit_code` and `stderr`.
    #[must_use]
    pub fn fail(self, command: &str, exit_code: i32, stderr: &str) -> Self {
        self.respond(
            command,
            CommandOutput {
                exit_code,
                stdout: String::new(),
                stderr: stderr.to_string(),
            },
        )
    }

    /// Returns every command run so far.
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().clone()
    }
}

#[async_trait]
impl ShellExecutor for RecordingShell {
    async fn run(&self, command: &str, _dir: &Path) -> CoreResult<CommandOutput> {
        self.commands.lock().push(command.to_string());
        Ok(self
            .responses
            .lock()
            .get(command)
            .cloned()
            .unwrap_or_default())
    }
}

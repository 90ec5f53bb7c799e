//! Interactive confirmation on the terminal.

use async_trait::async_trait;
use relay_core::Prompter;
use std::io::{self, BufRead, Write};
use tracing::warn;

/// Asks yes/no questions on stderr and reads answers from stdin.
///
/// Anything other than `y` or `yes` counts as "no", including end of input.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

#[async_trait]
impl Prompter for TerminalPrompter {
    async fn ask(&self, question: &str) -> bool {
        let question = question.to_string();
        let answer = tokio::task::spawn_blocking(move || -> io::Result<String> {
            let mut stderr = io::stderr();
            write!(stderr, "{question} [y/N] ")?;
            stderr.flush()?;
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            Ok(line)
        })
        .await;

        match answer {
            Ok(Ok(line)) => is_yes(&line),
            Ok(Err(e)) => {
                warn!(error = %e, "could not read answer");
                false
            }
            Err(e) => {
                warn!(error = %e, "prompt task failed");
                false
            }
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

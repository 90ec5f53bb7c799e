//! Seams to the outside world.
//!
//! The engine never parses patches, spawns processes or talks to a user
//! directly. It goes through these traits, each of which ships with a
//! default implementation:
//!
//! | Trait | Default |
//! |---|---|
//! | [`ContentTransformer`] | [`ReplaceTransformer`] |
//! | [`ShellExecutor`] | [`SystemShell`] |
//! | [`CheckRunner`] | [`ShellCheckRunner`] |
//! | [`Prompter`] | [`AutoPrompter`] |
//! | [`NotificationChannel`] | [`NoNotifications`] |

mod prompt;
mod shell;
mod transform;

pub use prompt::{AutoPrompter, NoNotifications, NotificationChannel, NotificationOutcome, Prompter};
pub use shell::{CheckRunner, CommandOutput, ShellCheckRunner, ShellExecutor, SystemShell};
pub use transform::{ContentTransformer, ReplaceTransformer};

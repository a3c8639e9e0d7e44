//! External command execution for grid tooling.
//!
//! Grid middleware commands (`glite-transfer-*`, `lcg-*`, `lfc-*`) are slow
//! and flaky. Every invocation goes through a [`CommandRunner`], which runs
//! the command with a timeout, classifies the outcome and retries a bounded
//! number of times before giving up.
//!
//! # Example
//!
//! ```ignore
//! use gridsync_core::command::{CommandConfig, CommandRunner, GridCommand, ProcessRunner, RunMode};
//!
//! let runner = ProcessRunner::new(CommandConfig::default());
//! let command = GridCommand::new("lcg-lr").arg("--vo").arg("t2k.org").arg(lfn);
//! let replicas = runner.run(&command, runner.default_timeout(), RunMode::Captured).await?;
//! ```

mod config;
mod error;
mod process;
mod traits;
mod types;

pub use config::CommandConfig;
pub use error::CommandError;
pub use process::{is_error_output, ProcessRunner};
pub(crate) use process::classify;
pub use traits::CommandRunner;
pub use types::{AttemptOutcome, GridCommand, RunMode};

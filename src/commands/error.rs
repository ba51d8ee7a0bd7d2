// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

use crate::engine::error::EngineError;
use crate::engine::provider;

pub type CommandResult<T> = Result<T, CommandError>;

pub const EXIT_OK: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
/// A required engine could not be reached
pub const EXIT_UNAVAILABLE: u8 = 2;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("{message}")]
    Input { message: String },

    #[error("cannot write output: {0}")]
    Output(#[from] std::io::Error),

    /// The command ran to completion but reported failures already
    #[error("{summary}")]
    Failed { summary: String },
}

impl CommandError {
    pub fn failed(summary: impl Into<String>) -> Self {
        Self::Failed {
            summary: summary.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            CommandError::Engine(e) if e.is_connection() => EXIT_UNAVAILABLE,
            _ => EXIT_FAILURE,
        }
    }

    /// Message for stderr, with a remediation hint for connection errors
    pub fn report(&self) -> String {
        let mut text = format!("error: {self}");
        if let CommandError::Engine(e) = self {
            if let Some(hint) = provider::remediation(e) {
                text.push('\n');
                text.push_str(&hint);
            }
        }
        text
    }
}

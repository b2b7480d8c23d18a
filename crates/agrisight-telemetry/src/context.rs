//! Command-level span.
//!
//! # Design
//! - Each CLI invocation runs inside one `command` span carrying the command name and build SHA.
//! - The span is entered for the lifetime of the guard so nested service spans inherit it.

use tracing::span::EnteredSpan;

use crate::init::build_sha;

/// Guard keeping the command span entered.
pub struct CommandSpan {
    _entered: EnteredSpan,
}

impl CommandSpan {
    /// Enter a span describing the running command.
    #[must_use]
    pub fn enter(command: &str) -> Self {
        let span = tracing::info_span!("command", name = %command, build_sha = %build_sha());
        Self {
            _entered: span.entered(),
        }
    }
}

use std::fmt;

/// Engine-level failure kinds. Parse errors are fatal for the whole run:
/// totals are sums, and a partial sum is worse than no output.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    MalformedDeadline { line: String, reason: String },
    MalformedRoster { line: String },
    UnknownStudent { user_id: String },
    /// Only constructed for reporting in append-only sync; missing rows are
    /// skipped there, never treated as run failure.
    LedgerRowNotFound { login: String },
    SheetWrite { message: String },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::MalformedDeadline { line, reason } => {
                write!(f, "malformed deadline line {:?}: {}", line, reason)
            }
            EngineError::MalformedRoster { line } => {
                write!(f, "malformed roster line {:?}: expected at least 2 tokens", line)
            }
            EngineError::UnknownStudent { user_id } => {
                write!(f, "submission references unknown student id {:?}", user_id)
            }
            EngineError::LedgerRowNotFound { login } => {
                write!(f, "no ledger row for login {:?}", login)
            }
            EngineError::SheetWrite { message } => {
                write!(f, "sheet transport failure: {}", message)
            }
        }
    }
}

impl std::error::Error for EngineError {}

//! Error types for the reconciliation core.
//!
//! Errors are classified by who fixes them:
//! - ValidationError: operator typed something unparseable; re-prompted, never
//!   propagated past the command layer.
//! - ConsistencyViolation: a command referenced state it is not allowed to
//!   touch; rejected with a message, state left unchanged.
//! - PortError (ports.rs): an external collaborator failed; degraded or
//!   reported, never allowed to corrupt in-memory meeting state.

use thiserror::Error;

use crate::types::InvoiceStatus;

/// Operator input that failed to parse or validate.
///
/// Range violations and parse failures are distinct variants so the prompt
/// can tell the operator *which* rule they broke.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("unable to parse time '{0}' (expected forms like '2:30 PM', '2PM' or '14:30')")]
    TimeFormat(String),

    #[error("unable to parse duration '{0}'")]
    DurationFormat(String),

    #[error("duration must be greater than 0 and at most 24 hours (got {0})")]
    DurationRange(f64),

    #[error("unable to parse rate '{0}'")]
    RateFormat(String),

    #[error("rate must be greater than 0 and at most 10000 (got {0})")]
    RateRange(f64),

    #[error("unrecognized command '{0}' (type 'help' for the command list)")]
    UnknownCommand(String),

    #[error("{0}")]
    Usage(String),
}

/// A command referenced a meeting or customer it may not touch.
///
/// Always a usage error: the message names the rule, and the session state is
/// guaranteed unchanged when one of these is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConsistencyViolation {
    #[error("no meeting with number {0}")]
    UnknownMeeting(usize),

    #[error("no unassociated meeting with number u{0}")]
    UnknownUnassociated(usize),

    #[error("meeting {index} is already {status} and cannot be selected")]
    AlreadyBilled { index: usize, status: InvoiceStatus },

    #[error("unassociated meeting u{0} must be assigned to a customer before it can be selected")]
    NotAssigned(usize),

    #[error("no customer with email '{0}'")]
    UnknownCustomer(String),
}

/// Top-level failure for a whole run. Per-item failures inside the run are
/// degraded or reported instead of raised; this only covers the calls the run
/// cannot continue without (roster fetch, event fetch, terminal I/O).
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Port(#[from] crate::ports::PortError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

use thiserror::Error;

/// Errors surfaced by the pager, space manager, and tree engine.
///
/// `NotFound` and "duplicate key" are not modeled here: both are expected,
/// recoverable outcomes and are returned as `Ok(None)` / `Ok(false)` by the
/// core API instead of as an `Err` variant.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt page {page_no}: {reason}")]
    Corrupt { page_no: u64, reason: String },

    #[error("unknown table id {0}")]
    UnknownTable(usize),

    #[error("invalid command: {0}")]
    InvalidOrder(String),
}

pub type Result<T> = std::result::Result<T, Error>;

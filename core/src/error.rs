use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unknown box: {box_id}")]
    UnknownBox { box_id: String },

    #[error("insufficient {currency}: need {needed}, have {available}")]
    InsufficientFunds {
        currency: String,
        needed: u64,
        available: u64,
    },

    #[error("bulk open locked: requested {requested}, unlocked tier allows {allowed}")]
    BulkLocked { requested: u32, allowed: u32 },

    // The underflow kinds signal invariant violations: every balance and
    // count is checked during planning, so hitting one at apply time is
    // fatal rather than a retryable input error.
    #[error("inventory underflow: {stack_id}")]
    InventoryUnderflow { stack_id: String },

    #[error("currency underflow: {currency}")]
    CurrencyUnderflow { currency: String },

    #[error("aggregate sum underflow: {dimension}")]
    SumUnderflow { dimension: String },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

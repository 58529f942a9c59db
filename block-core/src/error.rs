//! Error taxonomy (§7). Each variant corresponds to one of the categories the
//! specification names; all of them are reported to the client as `ERR
//! <message>` text by the dispatcher, except `Io`, which tears the
//! connection down, and `Internal`, which should never actually occur.

#[remain::sorted]
#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    #[error("hardware error: {0}")]
    Hardware(#[from] block_hw::HwError),
    #[error("internal error: {0}")]
    Internal(String),
    #[error("{0}")]
    Io(String),
    #[error("{0}")]
    Lookup(String),
    #[error("{0}")]
    Parse(String),
    #[error("{0}")]
    Range(String),
    #[error("{0}")]
    State(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    pub fn parse(msg: impl Into<String>) -> Self {
        CoreError::Parse(msg.into())
    }

    pub fn lookup(msg: impl Into<String>) -> Self {
        CoreError::Lookup(msg.into())
    }

    pub fn range(msg: impl Into<String>) -> Self {
        CoreError::Range(msg.into())
    }

    pub fn state(msg: impl Into<String>) -> Self {
        CoreError::State(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        CoreError::Internal(msg.into())
    }
}

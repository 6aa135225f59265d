use thiserror::Error;

/// errors that can only happen while building conditions.
/// once a Condition is built, `apply` never fails.
#[derive(Error, Debug)]
pub enum RouteError {
    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("invalid cidr: {0}")]
    InvalidCidr(String),

    #[error("invalid port range: {0}")]
    InvalidPortRange(String),

    #[error("not supported network string: {0}")]
    UnknownNetwork(String),

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, RouteError>;

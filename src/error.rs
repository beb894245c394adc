use thiserror::Error;

/// Scan-wide failures. Per-port failures are never errors; they classify as `Closed`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("invalid port range {start}-{end}: end port is below start port")]
    InvalidRange { start: u16, end: u16 },

    #[error("cannot resolve address `{address}`: {reason}")]
    UnresolvableAddress { address: String, reason: String },

    #[error("scan cancelled")]
    Cancelled,
}

/// Rejections produced while validating raw user input into a `ScanTarget`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("address must not be empty")]
    EmptyAddress,

    #[error("`{0}` is not a port number")]
    NotANumber(String),

    #[error("port number out of range: {0}")]
    OutOfRange(i64),

    #[error("end port {end} cannot be less than the start port {start}")]
    EndBeforeStart { start: u16, end: u16 },
}

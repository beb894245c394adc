//! Library crate for portprobe: a bounded-time TCP connect prober over one host's port range.
pub mod config;
pub mod connector;
pub mod error;
pub mod logging;
pub mod ports;
pub mod report;
pub mod scanner;
pub mod server;
pub mod types;

pub use config::ProbeConfig;
pub use error::{InputError, ProbeError};
pub use scanner::{probe, probe_with_cancel, Prober, SharedProgress};
pub use types::{PortOutcome, PortReport, ScanResult, ScanTarget};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound on in-flight connection attempts, regardless of what the caller asks for.
pub const MAX_CONCURRENCY: usize = 5_000;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Tuning knobs for one probe run.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeConfig {
    /// How long one connection attempt may block before the port counts as closed.
    #[serde(with = "millis")]
    pub per_attempt_timeout: Duration,
    /// Ports probed in parallel. `1` keeps the scan strictly sequential.
    pub port_concurrency: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            per_attempt_timeout: DEFAULT_TIMEOUT,
            port_concurrency: 1,
        }
    }
}

impl ProbeConfig {
    pub fn from_millis(timeout_ms: u64, concurrency: usize) -> Self {
        Self::default()
            .with_timeout(Duration::from_millis(timeout_ms))
            .with_concurrency(concurrency)
    }

    /// A zero timeout would classify everything closed without trying; it is raised to 1ms.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.per_attempt_timeout = timeout.max(Duration::from_millis(1));
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.port_concurrency = concurrency;
        self
    }

    pub fn effective_concurrency(&self) -> usize {
        self.port_concurrency.clamp(1, MAX_CONCURRENCY)
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// One scan request: an address and an inclusive port range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTarget {
    pub address: String,
    pub start_port: u16,
    pub end_port: u16,
}

impl ScanTarget {
    /// Build a target without validating it. Use `ports::build_target` for user input.
    pub fn new(address: impl Into<String>, start_port: u16, end_port: u16) -> Self {
        Self {
            address: address.into(),
            start_port,
            end_port,
        }
    }

    pub fn is_valid_range(&self) -> bool {
        self.start_port <= self.end_port
    }

    pub fn ports(&self) -> RangeInclusive<u16> {
        self.start_port..=self.end_port
    }

    /// Number of ports in range; zero for an inverted range.
    pub fn port_count(&self) -> u64 {
        if self.is_valid_range() {
            u64::from(self.end_port - self.start_port) + 1
        } else {
            0
        }
    }
}

/// Classification of one probed port.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PortOutcome {
    Open,
    Closed,
}

impl PortOutcome {
    pub fn is_open(self) -> bool {
        matches!(self, PortOutcome::Open)
    }
}

/// A single classification, streamed to observers as soon as it is known.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortReport {
    pub port: u16,
    pub outcome: PortOutcome,
}

/// Partition of a scanned range. Both lists are ascending.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    pub open: Vec<u16>,
    pub closed: Vec<u16>,
}

impl ScanResult {
    /// Sort classified ports and split them into open and closed lists.
    pub fn from_reports(mut reports: Vec<PortReport>) -> Self {
        reports.sort_unstable_by_key(|r| r.port);
        let mut out = ScanResult::default();
        for r in reports {
            match r.outcome {
                PortOutcome::Open => out.open.push(r.port),
                PortOutcome::Closed => out.closed.push(r.port),
            }
        }
        out
    }

    pub fn total(&self) -> usize {
        self.open.len() + self.closed.len()
    }
}

//! Engine configuration.

use serde::Deserialize;

use crate::readiness::Readiness;

/// Knobs for the reconstruction engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Start new books `Ready` instead of waiting for a transaction
    /// boundary. Only sound when the feed is known to begin on one.
    pub assume_ready: bool,
    /// Check the positive-volume invariant before every snapshot
    pub verify_on_commit: bool,
    /// Capacity hint for the metadata tables
    pub expected_instruments: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            assume_ready: false,
            verify_on_commit: false,
            expected_instruments: 1024,
        }
    }
}

impl EngineConfig {
    pub fn assume_ready(mut self, yes: bool) -> Self {
        self.assume_ready = yes;
        self
    }

    pub fn verify_on_commit(mut self, yes: bool) -> Self {
        self.verify_on_commit = yes;
        self
    }

    pub fn expected_instruments(mut self, count: usize) -> Self {
        self.expected_instruments = count;
        self
    }

    /// Readiness a newly created book starts in.
    #[inline]
    pub fn initial_readiness(&self) -> Readiness {
        if self.assume_ready {
            Readiness::Ready
        } else {
            Readiness::NotReady
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_wait_for_boundary() {
        let config = EngineConfig::default();
        assert!(!config.assume_ready);
        assert_eq!(config.initial_readiness(), Readiness::NotReady);
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::default()
            .assume_ready(true)
            .verify_on_commit(true)
            .expected_instruments(16);
        assert_eq!(config.initial_readiness(), Readiness::Ready);
        assert!(config.verify_on_commit);
        assert_eq!(config.expected_instruments, 16);
    }
}

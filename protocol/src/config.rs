//! # Protocol Configuration & Constants
//!
//! Every magic number in the goody ledger lives here, next to the runtime
//! tunables for the flow orchestrator. If you're hardcoding a constant
//! somewhere else, move it here.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Version stamped into every transaction. Part of the canonical byte
/// encoding, so a bump changes every transaction id.
pub const TRANSACTION_VERSION: u16 = 1;

/// The full version string of the protocol crate.
pub const PROTOCOL_VERSION: &str = "0.1.0";

/// Human-readable prefix for bech32-encoded party ids.
pub const PARTY_ID_HRP: &str = "goody";

// ---------------------------------------------------------------------------
// Data Model Limits
// ---------------------------------------------------------------------------

/// Maximum length of an issuer reference, in bytes. Issuers use the
/// reference to tag batches (a deposit id, a production run), not to
/// store documents.
pub const MAX_ISSUER_REF_SIZE: usize = 512;

/// Maximum number of inputs a single transition may consume.
pub const MAX_TX_INPUTS: usize = 256;

/// Maximum number of outputs a single transition may produce.
pub const MAX_TX_OUTPUTS: usize = 256;

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// How long a flow waits on the finality service before declaring the
/// outcome indeterminate.
pub const DEFAULT_FINALITY_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// FlowConfig
// ---------------------------------------------------------------------------

/// Runtime tunables for [`GoodyFlows`](crate::flows::GoodyFlows).
///
/// Defaults match the protocol constants above. Tests shrink the finality
/// timeout to exercise the indeterminate path without waiting half a
/// minute.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// Upper bound on a single finality submission.
    pub finality_timeout: Duration,

    /// Transitions consuming more states than this are refused before
    /// signing.
    pub max_inputs: usize,

    /// Transitions producing more states than this are refused before
    /// signing.
    pub max_outputs: usize,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            finality_timeout: DEFAULT_FINALITY_TIMEOUT,
            max_inputs: MAX_TX_INPUTS,
            max_outputs: MAX_TX_OUTPUTS,
        }
    }
}

impl FlowConfig {
    /// Overrides the finality timeout.
    pub fn with_finality_timeout(mut self, timeout: Duration) -> Self {
        self.finality_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_flow_config_matches_constants() {
        let config = FlowConfig::default();
        assert_eq!(config.finality_timeout, DEFAULT_FINALITY_TIMEOUT);
        assert_eq!(config.max_inputs, MAX_TX_INPUTS);
        assert_eq!(config.max_outputs, MAX_TX_OUTPUTS);
    }

    #[test]
    fn finality_timeout_override() {
        let config = FlowConfig::default().with_finality_timeout(Duration::from_millis(50));
        assert_eq!(config.finality_timeout, Duration::from_millis(50));
    }

    #[test]
    fn limits_are_sane() {
        assert!(MAX_ISSUER_REF_SIZE > 0);
        assert!(MAX_TX_INPUTS > 0);
        assert!(MAX_TX_OUTPUTS > 0);
    }
}

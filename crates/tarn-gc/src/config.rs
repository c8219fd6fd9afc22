//! Collector configuration.

use crate::error::GcError;
use crate::object::ALIGN;

/// Default size of each semispace in bytes.
pub const DEFAULT_SEMISPACE_SIZE: usize = 256 * 1024;

/// Smallest accepted semispace. Below this even the startup allocations of
/// an interpreter do not fit.
pub const MIN_SEMISPACE_SIZE: usize = 4 * 1024;

/// Tuning knobs for the heap.
///
/// `always_gc` forces a full collection before every allocation. It makes
/// the collector's behavior deterministic and immediately invalidates any
/// reference held outside a root slot, which is the fastest way to surface
/// a missing root. Observable program behavior must not change under it.
#[derive(Debug, Clone)]
pub struct GcConfig {
    /// Size of each of the two semispaces in bytes.
    pub semispace_size: usize,

    /// Collect before every allocation instead of only on exhaustion.
    pub always_gc: bool,

    /// Log a summary line after every collection cycle.
    pub verbose: bool,
}

impl Default for GcConfig {
    fn default() -> GcConfig {
        GcConfig {
            semispace_size: DEFAULT_SEMISPACE_SIZE,
            always_gc: false,
            verbose: false,
        }
    }
}

impl GcConfig {
    /// Checks the configuration for values the heap cannot work with.
    pub fn validate(&self) -> Result<(), GcError> {
        if self.semispace_size < MIN_SEMISPACE_SIZE {
            return Err(GcError::InvalidConfig(format!(
                "semispace size {} is below the minimum of {} bytes",
                self.semispace_size, MIN_SEMISPACE_SIZE
            )));
        }
        if self.semispace_size % ALIGN != 0 {
            return Err(GcError::InvalidConfig(format!(
                "semispace size {} is not a multiple of {} bytes",
                self.semispace_size, ALIGN
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(GcConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_tiny_semispace() {
        let config = GcConfig {
            semispace_size: 512,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unaligned_semispace() {
        let config = GcConfig {
            semispace_size: MIN_SEMISPACE_SIZE + 3,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}

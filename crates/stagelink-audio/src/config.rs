//! Engine configuration.

/// Runtime configuration for the audio engine.
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Whether playback is enabled at all. While disabled, every play
    /// operation is a no-op and no resources are created.
    pub enabled: bool,
    /// Per-operation debug logging (useful during commissioning, noisy
    /// in production).
    pub debug: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debug: false,
        }
    }
}

/// A partial configuration change; `None` fields keep their current
/// value.
///
/// Setting `enabled: Some(false)` implies stopping every live resource.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigUpdate {
    pub enabled: Option<bool>,
    pub debug: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_enabled_without_debug() {
        let config = AudioConfig::default();
        assert!(config.enabled);
        assert!(!config.debug);
    }
}

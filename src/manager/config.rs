//! Stream manager configuration

/// Stream manager configuration options
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Name used in log output and when printing the manager
    pub label: String,

    /// Panic when a closed stream cannot be found for cleanup
    ///
    /// The fault is always logged and counted; this turns it into a panic on
    /// the thread that closed the stream.
    pub panic_on_inconsistency: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            label: "StreamManager".to_owned(),
            panic_on_inconsistency: false,
        }
    }
}

impl ManagerConfig {
    /// Set the label
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Panic on consistency faults instead of only logging them
    pub fn panic_on_inconsistency(mut self, enabled: bool) -> Self {
        self.panic_on_inconsistency = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ManagerConfig::default();

        assert_eq!(config.label, "StreamManager");
        assert!(!config.panic_on_inconsistency);
    }

    #[test]
    fn test_builder_chaining() {
        let config = ManagerConfig::default()
            .label("ingest")
            .panic_on_inconsistency(true);

        assert_eq!(config.label, "ingest");
        assert!(config.panic_on_inconsistency);
    }
}

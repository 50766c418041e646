/// Dispatcher configuration
///
/// Builder-style: start from [`DispatcherConfig::new`] and override what differs.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Backend identifier matched against query overrides; the executor's own when `None`
    pub backend: Option<String>,

    /// Install the built-in enum, boolean, temporal and UUID column mapper factories
    pub default_column_factories: bool,

    /// Install the built-in parameter converters
    pub default_parameter_converters: bool,

    /// Validate every method when a repository is registered
    pub validate_on_register: bool,
}

impl DispatcherConfig {
    /// Create a configuration with every built-in enabled
    pub fn new() -> Self {
        Self {
            backend: None,
            default_column_factories: true,
            default_parameter_converters: true,
            validate_on_register: true,
        }
    }

    /// Set the backend identifier
    pub fn backend(mut self, backend: &str) -> Self {
        self.backend = Some(backend.to_string());
        self
    }

    /// Enable or disable the built-in column mapper factories
    ///
    /// The catch-all default factory is installed regardless.
    pub fn default_column_factories(mut self, enabled: bool) -> Self {
        self.default_column_factories = enabled;
        self
    }

    /// Enable or disable the built-in parameter converters
    pub fn default_parameter_converters(mut self, enabled: bool) -> Self {
        self.default_parameter_converters = enabled;
        self
    }

    /// Enable or disable validation on repository registration
    pub fn validate_on_register(mut self, enabled: bool) -> Self {
        self.validate_on_register = enabled;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if let Some(backend) = &self.backend {
            if backend.trim().is_empty() {
                return Err("backend identifier cannot be empty".to_string());
            }
        }
        Ok(())
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides() {
        let config = DispatcherConfig::new()
            .backend("pgsql")
            .default_column_factories(false)
            .validate_on_register(false);
        assert_eq!(config.backend.as_deref(), Some("pgsql"));
        assert!(!config.default_column_factories);
        assert!(config.default_parameter_converters);
        assert!(!config.validate_on_register);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_blank_backend_is_invalid() {
        assert!(DispatcherConfig::new().backend("  ").validate().is_err());
    }
}

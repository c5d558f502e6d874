//! Registry error types
//!
//! Error types for the strict forms of registry operations.

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// No entry is registered under this name
    NotFound(String),
    /// An entry is already registered under this name
    AlreadyExists(String),
}

impl RegistryError {
    /// Name of the entry the error refers to
    pub fn name(&self) -> &str {
        match self {
            RegistryError::NotFound(name) | RegistryError::AlreadyExists(name) => name,
        }
    }
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::NotFound(name) => write!(f, "Entry not found: {}", name),
            RegistryError::AlreadyExists(name) => write!(f, "Entry already exists: {}", name),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Result alias for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = RegistryError::NotFound("cam1".into());
        assert_eq!(err.to_string(), "Entry not found: cam1");

        let err = RegistryError::AlreadyExists("cam1".into());
        assert_eq!(err.to_string(), "Entry already exists: cam1");
        assert_eq!(err.name(), "cam1");
    }
}

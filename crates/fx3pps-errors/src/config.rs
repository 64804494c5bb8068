//! Configuration validation errors.

/// Errors produced while validating generator, receiver or service settings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Value out of range
    #[error("{field} value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Field name
        field: String,
        /// The invalid value
        value: String,
        /// Minimum allowed value
        min: String,
        /// Maximum allowed value
        max: String,
    },

    /// Value must be a power of two
    #[error("{field} value {value} must be a power of two")]
    NotPowerOfTwo {
        /// Field name
        field: String,
        /// The invalid value
        value: u64,
    },

    /// Any other constraint violation
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Create an out of range error.
    pub fn out_of_range<T: ToString>(field: impl Into<String>, value: T, min: T, max: T) -> Self {
        ConfigError::OutOfRange {
            field: field.into(),
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        }
    }

    /// Create a power-of-two error.
    pub fn not_power_of_two(field: impl Into<String>, value: u64) -> Self {
        ConfigError::NotPowerOfTwo {
            field: field.into(),
            value,
        }
    }

    /// Create a generic constraint violation.
    pub fn invalid(msg: impl Into<String>) -> Self {
        ConfigError::Invalid(msg.into())
    }

    /// Name of the offending field, when known.
    pub fn field(&self) -> Option<&str> {
        match self {
            ConfigError::OutOfRange { field, .. } | ConfigError::NotPowerOfTwo { field, .. } => {
                Some(field)
            }
            ConfigError::Invalid(_) => None,
        }
    }
}

//! Error classification shared across the Indivo crates
//!
//! Layers keep their own `thiserror` enums (`IndivoError`, `KeychainError`,
//! `LoginError`) and classify them through [`ErrorClassification`] so retry
//! and logging decisions stay consistent.
//!
//! | Error | Retryable | Severity |
//! |-------|-----------|----------|
//! | `Configuration` | no | Error |
//! | `Authentication` | no (re-run the handshake) | Warning |
//! | `Discovery` | no | Warning |
//! | `Network` | yes | Warning |
//! | `Server` 5xx | yes | Error |
//! | `Cancelled` / `SessionInvalidated` | no | Info |
//! | `DoubleCompletion` | no | Critical |

use std::fmt;
use std::time::Duration;

use indivo_domain::IndivoError;

/// Standard interface for classifying errors by their characteristics
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Retryable errors are transient issues that may succeed if attempted
    /// again, such as transport failures or server-side 5xx responses.
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    ///
    /// Used for logging and alerting decisions.
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool;

    /// Get the suggested retry delay if applicable
    fn retry_after(&self) -> Option<Duration>;
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, expected conditions
    Info,
    /// Degraded but operational
    Warning,
    /// Failure requiring attention
    Error,
    /// Logic fault, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl ErrorClassification for IndivoError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Configuration(_) | Self::InvalidResponse(_) | Self::Keychain(_) => {
                ErrorSeverity::Error
            }
            Self::Authentication(_) | Self::Discovery(_) | Self::Network(_) => {
                ErrorSeverity::Warning
            }
            Self::Server { status, .. } if *status >= 500 => ErrorSeverity::Error,
            Self::Server { .. } => ErrorSeverity::Warning,
            Self::Cancelled | Self::SessionInvalidated => ErrorSeverity::Info,
            Self::DoubleCompletion(_) => ErrorSeverity::Critical,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::DoubleCompletion(_))
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Network(_) => Some(Duration::from_secs(5)),
            Self::Server { status, .. } if *status >= 500 => Some(Duration::from_secs(10)),
            _ => None,
        }
    }
}

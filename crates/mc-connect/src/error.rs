//! Error types for the mc-connect crate.
//!
//! Neither error type is ever fatal to a scan: owner failures make the
//! dispatcher move on to the next owner, notification failures are logged
//! and dropped.

/// Errors raised by media-manager clients.
#[derive(Debug, thiserror::Error)]
pub enum OwnerError {
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client for {owner}: {source}")]
    Client {
        /// Owner name.
        owner: String,
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// A request failed in transport or returned an error status.
    #[error("{owner} request to {endpoint} failed: {source}")]
    Request {
        /// Owner name.
        owner: String,
        /// API endpoint that failed (without the base URL).
        endpoint: String,
        /// The underlying HTTP error.
        #[source]
        source: reqwest::Error,
    },

    /// The service reported an empty version from its status endpoint.
    #[error("{owner} did not report a version")]
    NoVersion {
        /// Owner name.
        owner: String,
    },

    /// The owner configuration cannot be used.
    #[error("invalid configuration for {owner}: {reason}")]
    Config {
        /// Owner name.
        owner: String,
        /// What is wrong.
        reason: String,
    },
}

impl OwnerError {
    /// Creates a new [`OwnerError::Request`] error.
    #[inline]
    pub fn request(owner: impl Into<String>, endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Request {
            owner: owner.into(),
            endpoint: endpoint.into(),
            source,
        }
    }

    /// Creates a new [`OwnerError::Config`] error.
    #[inline]
    pub fn config(owner: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config {
            owner: owner.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if retrying later could succeed.
    #[inline]
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Request { .. })
    }
}

/// Errors raised by notification channels.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Delivery failed in transport or with an error status.
    #[error("notification to {channel} failed: {source}")]
    Delivery {
        /// Channel name.
        channel: String,
        /// The underlying HTTP error.
        #[source]
        source: reqwest::Error,
    },

    /// The channel configuration cannot be used.
    #[error("invalid notification channel {channel}: {reason}")]
    Config {
        /// Channel name.
        channel: String,
        /// What is wrong.
        reason: String,
    },
}

impl NotifyError {
    /// Creates a new [`NotifyError::Config`] error.
    #[inline]
    pub fn config(channel: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config {
            channel: channel.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_display() {
        let err = OwnerError::config("tv", "api key is empty");
        assert_eq!(err.to_string(), "invalid configuration for tv: api key is empty");
        assert!(!err.is_transient());

        let err = NotifyError::config("discord", "not a webhook URL");
        assert!(err.to_string().contains("discord"));
    }
}

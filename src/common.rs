use thiserror::Error;

/// Errors that could occur while building the statsd client from a [`MetricsConfig`].
///
/// A configuration without a host is not an error: the facade is simply disabled.
///
/// [`MetricsConfig`]: crate::MetricsConfig
#[derive(Clone, Debug, Error)]
pub enum ConfigurationError {
    /// The host is empty or contains characters no resolver would accept.
    #[error("statsd host is not valid: {0:?}")]
    InvalidHost(String),

    /// The host could not be resolved into a socket address.
    #[error("statsd host {host}:{port} could not be resolved: {reason}")]
    UnresolvableHost {
        host: String,
        port: u16,
        reason: String,
    },

    /// Resolution succeeded but produced no addresses.
    #[error("statsd host {host}:{port} resolved to no addresses")]
    NoAddress { host: String, port: u16 },

    /// The local UDP socket could not be created.
    #[error("failed to bind local socket for statsd: {0}")]
    FailedToBindSocket(String),
}

/// Port used by statsd daemons unless told otherwise.
pub const DEFAULT_PORT: u16 = 8125;

/// Settings the [`MetricsService`][crate::MetricsService] builds its client from.
///
/// A config without a host leaves the service disabled: every metric call becomes a no-op.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetricsConfig {
    host: Option<String>,
    port: u16,
    namespace: Option<String>,
    append_hostname: bool,
}

impl MetricsConfig {
    /// Creates a new, disabled [`MetricsConfig`].
    ///
    /// The port defaults to 8125 and hostnames are appended to metric names.
    pub fn new() -> Self {
        Self {
            host: None,
            port: DEFAULT_PORT,
            namespace: None,
            append_hostname: true,
        }
    }

    /// Sets the statsd host, enabling the service.
    ///
    /// An empty host is treated the same as no host at all.
    #[must_use]
    pub fn with_host<H>(mut self, host: H) -> Self
    where
        H: Into<String>,
    {
        self.host = Some(host.into());
        self
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the namespace the client prefixes to every metric name.
    #[must_use]
    pub fn with_namespace<N>(mut self, namespace: N) -> Self
    where
        N: Into<String>,
    {
        self.namespace = Some(namespace.into());
        self
    }

    /// Controls whether the machine hostname is appended to every metric name.
    ///
    /// Defaults to `true`.
    #[must_use]
    pub fn append_hostname(mut self, append: bool) -> Self {
        self.append_hostname = append;
        self
    }

    /// The configured host, if it is set and non-empty.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref().filter(|host| !host.is_empty())
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref().filter(|ns| !ns.is_empty())
    }

    pub fn appends_hostname(&self) -> bool {
        self.append_hostname
    }

    /// Whether a client should be built from this config at all.
    pub fn is_enabled(&self) -> bool {
        self.host().is_some()
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{MetricsConfig, DEFAULT_PORT};

    #[test]
    fn test_defaults() {
        let config = MetricsConfig::default();
        assert_eq!(config.host(), None);
        assert_eq!(config.port(), DEFAULT_PORT);
        assert_eq!(config.namespace(), None);
        assert!(config.appends_hostname());
        assert!(!config.is_enabled());
    }

    #[test]
    fn test_builder() {
        let config = MetricsConfig::new()
            .with_host("testhost")
            .with_port(1234)
            .with_namespace("test")
            .append_hostname(false);

        assert_eq!(config.host(), Some("testhost"));
        assert_eq!(config.port(), 1234);
        assert_eq!(config.namespace(), Some("test"));
        assert!(!config.appends_hostname());
        assert!(config.is_enabled());
    }

    #[test]
    fn test_empty_host_is_disabled() {
        let config = MetricsConfig::new().with_host("").with_namespace("");
        assert_eq!(config.host(), None);
        assert_eq!(config.namespace(), None);
        assert!(!config.is_enabled());
    }
}

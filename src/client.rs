use std::fmt;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};

use tracing::{debug, error};

use crate::common::ConfigurationError;
use crate::formatting::write_metric_line;

/// The statsd operations the [`MetricsService`][crate::MetricsService] forwards to.
///
/// Names arrive already resolved (hostname appended when configured). Implementations are
/// expected to be fire-and-forget: emitting a metric must never fail the caller.
pub trait StatsdClient: Send + Sync {
    /// Increments a counter by one.
    fn increment(&self, name: &str, sample_rate: Option<f32>) {
        self.count(name, 1, sample_rate)
    }

    /// Decrements a counter by one.
    fn decrement(&self, name: &str, sample_rate: Option<f32>) {
        self.count(name, -1, sample_rate)
    }

    /// Adjusts a counter by `delta`.
    fn count(&self, name: &str, delta: i64, sample_rate: Option<f32>);

    /// Sets a gauge to `value`.
    fn gauge(&self, name: &str, value: f64, sample_rate: Option<f32>);

    /// Records a timing, in milliseconds.
    fn timing(&self, name: &str, ms: u64, sample_rate: Option<f32>);
}

/// A [`StatsdClient`] writing one UDP datagram per metric.
pub struct UdpStatsdClient {
    host: String,
    port: u16,
    namespace: Option<String>,
    endpoint: SocketAddr,
    socket: UdpSocket,
}

impl UdpStatsdClient {
    /// Resolves `host:port` and binds a local socket to send from.
    ///
    /// ## Errors
    ///
    /// If the host is malformed or cannot be resolved, or the local socket cannot be bound, an
    /// error variant will be returned describing the error.
    pub fn connect(
        host: &str,
        port: u16,
        namespace: Option<&str>,
    ) -> Result<Self, ConfigurationError> {
        if host.is_empty() || host.chars().any(char::is_whitespace) {
            return Err(ConfigurationError::InvalidHost(host.to_string()));
        }

        let endpoint = (host, port)
            .to_socket_addrs()
            .map_err(|e| ConfigurationError::UnresolvableHost {
                host: host.to_string(),
                port,
                reason: e.to_string(),
            })?
            .next() // just use the first address we resolve to
            .ok_or_else(|| ConfigurationError::NoAddress {
                host: host.to_string(),
                port,
            })?;

        let socket = bind_for(&endpoint)
            .map_err(|e| ConfigurationError::FailedToBindSocket(e.to_string()))?;

        debug!(host, port, %endpoint, "statsd client bound");

        Ok(Self {
            host: host.to_string(),
            port,
            namespace: namespace.filter(|ns| !ns.is_empty()).map(str::to_string),
            endpoint,
            socket,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    fn send<T>(&self, name: &str, mtype: &str, value: T, sample_rate: Option<f32>)
    where
        T: fmt::Display,
    {
        if !sampled(sample_rate) {
            return;
        }

        let mut line = String::new();
        write_metric_line(
            &mut line,
            self.namespace.as_deref(),
            name,
            mtype,
            value,
            sample_rate,
        );

        match self.socket.send_to(line.as_bytes(), self.endpoint) {
            Ok(nsent) => {
                if nsent != line.len() {
                    error!(
                        "Somehow this UDP socket sent less bytes ({}) than it was asked ({})",
                        nsent,
                        line.len()
                    );
                }
            }
            Err(e) => error!("error sending metric to statsd at {}: {:?}", self.endpoint, e),
        }
    }
}

impl StatsdClient for UdpStatsdClient {
    fn count(&self, name: &str, delta: i64, sample_rate: Option<f32>) {
        self.send(name, "c", delta, sample_rate)
    }

    fn gauge(&self, name: &str, value: f64, sample_rate: Option<f32>) {
        self.send(name, "g", value, sample_rate)
    }

    fn timing(&self, name: &str, ms: u64, sample_rate: Option<f32>) {
        self.send(name, "ms", ms, sample_rate)
    }
}

impl fmt::Debug for UdpStatsdClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UdpStatsdClient")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("namespace", &self.namespace)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

fn bind_for(endpoint: &SocketAddr) -> io::Result<UdpSocket> {
    let local: SocketAddr = match endpoint {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    let socket = UdpSocket::bind(local)?;
    socket.set_nonblocking(true)?;
    Ok(socket)
}

// A rate below one means only that fraction of calls should reach the daemon.
fn sampled(sample_rate: Option<f32>) -> bool {
    match sample_rate {
        Some(rate) if rate < 1.0 => rand::random::<f32>() < rate,
        _ => true,
    }
}

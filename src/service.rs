use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};

use quanta::Clock;
use tracing::{debug, error};

use crate::client::{StatsdClient, UdpStatsdClient};
use crate::common::ConfigurationError;
use crate::config::MetricsConfig;
use crate::formatting::escape;
use crate::timer::Timer;

type ClientFactory =
    dyn Fn(&MetricsConfig) -> Result<Arc<dyn StatsdClient>, ConfigurationError> + Send + Sync;
type HostnameResolver = dyn Fn() -> String + Send + Sync;

/// A constructed client together with the naming policy it was configured with.
#[derive(Clone)]
pub struct MetricsClientHandle {
    client: Arc<dyn StatsdClient>,
    append_hostname: bool,
}

impl MetricsClientHandle {
    pub fn client(&self) -> &Arc<dyn StatsdClient> {
        &self.client
    }

    /// Whether metric names sent through this handle get the hostname appended.
    pub fn appends_hostname(&self) -> bool {
        self.append_hostname
    }
}

impl fmt::Debug for MetricsClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsClientHandle")
            .field("append_hostname", &self.append_hostname)
            .finish_non_exhaustive()
    }
}

// What the last build attempt left behind.
enum Instance {
    Ready(MetricsClientHandle),
    Failed(ConfigurationError),
}

/// Single point of contact for emitting counters, gauges and timings.
///
/// The statsd client is built lazily from the current [`MetricsConfig`] on the first metric call
/// and cached until [`reset_instance`][Self::reset_instance]. Without a configured host every call
/// is a silent no-op, so instrumented code never needs to check whether metrics are enabled.
///
/// Construction is serialized: concurrent first calls build the client exactly once. A failed build
/// is remembered too, until the next [`configure`][Self::configure] or reset.
pub struct MetricsService {
    config: RwLock<MetricsConfig>,
    instance: Mutex<Option<Instance>>,
    hostname: OnceLock<String>,
    resolve_hostname: Box<HostnameResolver>,
    client_factory: Box<ClientFactory>,
    clock: Clock,
}

impl MetricsService {
    /// Creates a new, unconfigured [`MetricsService`] which sends over UDP once configured.
    pub fn new() -> Self {
        Self {
            config: RwLock::new(MetricsConfig::new()),
            instance: Mutex::new(None),
            hostname: OnceLock::new(),
            resolve_hostname: Box::new(machine_hostname),
            client_factory: Box::new(udp_client),
            clock: Clock::new(),
        }
    }

    /// The process-wide service, for code that cannot have one injected.
    pub fn global() -> &'static MetricsService {
        static GLOBAL: OnceLock<MetricsService> = OnceLock::new();
        GLOBAL.get_or_init(MetricsService::new)
    }

    /// Replaces how clients are built from a config.
    #[must_use]
    pub fn with_client_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&MetricsConfig) -> Result<Arc<dyn StatsdClient>, ConfigurationError>
            + Send
            + Sync
            + 'static,
    {
        self.client_factory = Box::new(factory);
        self
    }

    /// Replaces how the machine hostname is looked up.
    #[must_use]
    pub fn with_hostname_resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.resolve_hostname = Box::new(resolver);
        self
    }

    /// Replaces the clock timings are measured with.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Stores the config the next client will be built from.
    ///
    /// An already constructed client is unaffected until [`reset_instance`][Self::reset_instance];
    /// a remembered build failure is forgotten so the new settings are tried on the next call.
    pub fn configure(&self, config: MetricsConfig) {
        let mut instance = self.instance.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(*instance, Some(Instance::Failed(_))) {
            instance.take();
        }
        debug!(
            host = config.host(),
            port = config.port(),
            namespace = config.namespace(),
            append_hostname = config.appends_hostname(),
            "statsd configured"
        );
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
    }

    pub fn config(&self) -> MetricsConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Discards the cached client, or a remembered build failure, so the next call rebuilds it from
    /// the current config.
    pub fn reset_instance(&self) {
        self.instance
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Returns the cached client, building it first if the config names a host.
    ///
    /// ## Errors
    ///
    /// If the configured host cannot be turned into a client, an error variant will be returned
    /// describing the error. The failure is remembered and returned again, without retrying, until
    /// the next [`configure`][Self::configure] or [`reset_instance`][Self::reset_instance].
    pub fn instance(&self) -> Result<Option<MetricsClientHandle>, ConfigurationError> {
        let mut instance = self.instance.lock().unwrap_or_else(PoisonError::into_inner);
        match instance.as_ref() {
            Some(Instance::Ready(handle)) => return Ok(Some(handle.clone())),
            Some(Instance::Failed(e)) => return Err(e.clone()),
            None => (),
        }

        let config = self.config();
        if !config.is_enabled() {
            return Ok(None);
        }

        match (self.client_factory)(&config) {
            Ok(client) => {
                let handle = MetricsClientHandle {
                    client,
                    append_hostname: config.appends_hostname(),
                };
                *instance = Some(Instance::Ready(handle.clone()));
                Ok(Some(handle))
            }
            Err(e) => {
                error!("failed to build statsd client, metrics are off until reconfigured: {}", e);
                *instance = Some(Instance::Failed(e.clone()));
                Err(e)
            }
        }
    }

    /// Whether names are currently suffixed with the hostname.
    ///
    /// Follows the cached client when there is one, the stored config otherwise.
    pub fn append_hostname(&self) -> bool {
        let instance = self.instance.lock().unwrap_or_else(PoisonError::into_inner);
        match instance.as_ref() {
            Some(Instance::Ready(handle)) => handle.append_hostname,
            _ => self.config().appends_hostname(),
        }
    }

    /// The machine hostname, looked up once and memoised.
    pub fn hostname(&self) -> &str {
        self.hostname.get_or_init(|| (self.resolve_hostname)())
    }

    /// The name a metric is actually sent under.
    pub fn resolve_name(&self, name: &str) -> String {
        self.qualify(name, self.append_hostname())
    }

    fn qualify(&self, name: &str, append_hostname: bool) -> String {
        if append_hostname {
            format!("{}.{}", name, escape(self.hostname()))
        } else {
            name.to_string()
        }
    }

    fn forward<R, F>(&self, name: &str, call: F) -> Result<Option<R>, ConfigurationError>
    where
        F: FnOnce(&dyn StatsdClient, &str) -> R,
    {
        let handle = match self.instance()? {
            Some(handle) => handle,
            None => return Ok(None),
        };
        let name = self.qualify(name, handle.append_hostname);
        Ok(Some(call(handle.client.as_ref(), &name)))
    }

    pub fn increment(
        &self,
        name: &str,
        sample_rate: Option<f32>,
    ) -> Result<Option<()>, ConfigurationError> {
        self.forward(name, |client, name| client.increment(name, sample_rate))
    }

    pub fn decrement(
        &self,
        name: &str,
        sample_rate: Option<f32>,
    ) -> Result<Option<()>, ConfigurationError> {
        self.forward(name, |client, name| client.decrement(name, sample_rate))
    }

    pub fn count(
        &self,
        name: &str,
        delta: i64,
        sample_rate: Option<f32>,
    ) -> Result<Option<()>, ConfigurationError> {
        self.forward(name, |client, name| client.count(name, delta, sample_rate))
    }

    pub fn gauge(
        &self,
        name: &str,
        value: f64,
        sample_rate: Option<f32>,
    ) -> Result<Option<()>, ConfigurationError> {
        self.forward(name, |client, name| client.gauge(name, value, sample_rate))
    }

    pub fn timing(
        &self,
        name: &str,
        ms: u64,
        sample_rate: Option<f32>,
    ) -> Result<Option<()>, ConfigurationError> {
        self.forward(name, |client, name| client.timing(name, ms, sample_rate))
    }

    /// Starts a [`Timer`] reporting under the resolved `name`, or `None` when disabled.
    ///
    /// A client that fails to build means no timer: timing is best effort, and the failure was
    /// already logged when the build was attempted.
    pub fn start_timer(&self, name: &str) -> Option<Timer> {
        match self.instance() {
            Ok(Some(handle)) => {
                let name = self.qualify(name, handle.append_hostname);
                Some(Timer::new(name, handle.client, self.clock.clone()))
            }
            Ok(None) | Err(_) => None,
        }
    }

    /// Runs `f` and returns its result, emitting how long it took when metrics are enabled.
    ///
    /// The timing is emitted even if `f` panics; the panic then continues unwinding.
    pub fn time<T, F>(&self, name: &str, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        let _timer = self.start_timer(name);
        f()
    }

    /// Like [`time`][Self::time], emitting the timing with `sample_rate`.
    pub fn time_with_sample_rate<T, F>(&self, name: &str, sample_rate: f32, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        let _timer = self
            .start_timer(name)
            .map(|timer| timer.with_sample_rate(sample_rate));
        f()
    }
}

impl Default for MetricsService {
    fn default() -> Self {
        MetricsService::new()
    }
}

impl fmt::Debug for MetricsService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsService")
            .field("config", &self.config())
            .field("hostname", &self.hostname.get())
            .finish_non_exhaustive()
    }
}

fn machine_hostname() -> String {
    gethostname::gethostname().to_string_lossy().into_owned()
}

fn udp_client(config: &MetricsConfig) -> Result<Arc<dyn StatsdClient>, ConfigurationError> {
    let host = config
        .host()
        .ok_or_else(|| ConfigurationError::InvalidHost(String::new()))?;
    let client = UdpStatsdClient::connect(host, config.port(), config.namespace())?;
    Ok(Arc::new(client))
}

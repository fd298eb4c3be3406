//! A lazily configured facade over a statsd client.
//!
//! ## Basics
//!
//! `statsd-facade` gives an application one place to emit counters, gauges and timings from.
//! The underlying statsd client is only built on the first metric call, from whatever
//! [`MetricsConfig`] the application stored at startup. Without a configured host every call is
//! a silent no-op, so instrumented code never has to check whether metrics are enabled.
//!
//! ## High-level features
//!
//! - lazy, once-only client construction with explicit [`reset_instance`][MetricsService::reset_instance]
//! - optional machine hostname suffix on every metric name, with dots escaped
//! - closure and guard based timings that never alter the timed code's result
//! - per-request summary lines (`[STATSD] (total: 12.30) (active_record: 4.00)`) written to any
//!   [`LogSink`], including [`tracing`]
//!
//! ## Usage
//!
//! ```ignore
//! let metrics = MetricsService::new();
//! metrics.configure(
//!     MetricsConfig::new()
//!         .with_host("127.0.0.1")
//!         .with_port(8125)
//!         .with_namespace("app"),
//! );
//!
//! // sent as `app.requests.<hostname>:1|c`
//! metrics.increment("requests", None)?;
//!
//! let rows = metrics.time("db.query", || run_query());
//!
//! let logger = RequestLogger::new(TracingSink);
//! logger.log(&RequestTimings::new().with_total_ms(12.3).with_active_record_ms(4.0));
//! ```
mod common;
pub use self::common::ConfigurationError;

mod config;
pub use self::config::{MetricsConfig, DEFAULT_PORT};

mod client;
pub use self::client::{StatsdClient, UdpStatsdClient};

pub mod formatting;
pub use self::formatting::{escape, escape_with, Escape};

mod service;
pub use self::service::{MetricsClientHandle, MetricsService};

mod timer;
pub use self::timer::Timer;

pub mod request_logger;
pub use self::request_logger::{
    build_log_message, LogSink, RequestLogger, RequestStat, RequestTimings, TracingSink,
    DEFAULT_HEADER,
};

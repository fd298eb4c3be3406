//! Per-request timing summaries rendered as a single log line.
//!
//! ```text
//! [STATSD] (total: 100.21) (active_record: 24.00)
//! ```
use std::fmt;

use tracing::info;

use crate::formatting::format_ms;

/// Header used when the caller does not supply one.
pub const DEFAULT_HEADER: &str = "STATSD";

/// Timings collected for a single request.
///
/// Every duration is optional; absent ones are left out of the log line entirely.
pub trait RequestStat {
    /// Total time spent handling the request, in milliseconds.
    fn total_ms(&self) -> Option<f64>;

    /// Time spent in the database layer, in milliseconds.
    fn active_record_ms(&self) -> Option<f64> {
        None
    }
}

/// A plain [`RequestStat`] for callers that just have the numbers at hand.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RequestTimings {
    pub total_ms: Option<f64>,
    pub active_record_ms: Option<f64>,
}

impl RequestTimings {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_total_ms(mut self, ms: f64) -> Self {
        self.total_ms = Some(ms);
        self
    }

    #[must_use]
    pub fn with_active_record_ms(mut self, ms: f64) -> Self {
        self.active_record_ms = Some(ms);
        self
    }
}

impl RequestStat for RequestTimings {
    fn total_ms(&self) -> Option<f64> {
        self.total_ms
    }

    fn active_record_ms(&self) -> Option<f64> {
        self.active_record_ms
    }
}

// Rendered in this order, after the header.
fn fields(stat: &dyn RequestStat) -> [(&'static str, Option<f64>); 2] {
    [
        ("total", stat.total_ms()),
        ("active_record", stat.active_record_ms()),
    ]
}

/// Renders `stat` as `[header] (label: X.XX) ...`.
///
/// Values are rounded half away from zero to two decimals.
pub fn build_log_message(stat: &dyn RequestStat, header: &str) -> String {
    let mut out = format!("[{}]", header);
    for (label, value) in fields(stat) {
        if let Some(value) = value {
            out.push_str(" (");
            out.push_str(label);
            out.push_str(": ");
            out.push_str(format_ms(value).as_str());
            out.push(')');
        }
    }
    out
}

/// Destination for rendered request lines.
pub trait LogSink: Send + Sync {
    fn info(&self, message: &str);
}

impl<F> LogSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn info(&self, message: &str) {
        self(message)
    }
}

/// A [`LogSink`] writing through [`tracing`] at info level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn info(&self, message: &str) {
        info!("{}", message);
    }
}

/// Writes one summary line per request to an optional sink.
#[derive(Default)]
pub struct RequestLogger {
    sink: Option<Box<dyn LogSink>>,
}

impl RequestLogger {
    pub fn new<S>(sink: S) -> Self
    where
        S: LogSink + 'static,
    {
        Self {
            sink: Some(Box::new(sink)),
        }
    }

    /// A logger without a sink; [`log`][Self::log] does nothing.
    pub fn disabled() -> Self {
        Self { sink: None }
    }

    pub fn build_log_message(&self, stat: &dyn RequestStat) -> String {
        build_log_message(stat, DEFAULT_HEADER)
    }

    pub fn build_log_message_with_header(&self, stat: &dyn RequestStat, header: &str) -> String {
        build_log_message(stat, header)
    }

    /// Writes the line for `stat` under the default header.
    pub fn log(&self, stat: &dyn RequestStat) {
        self.log_with_header(stat, DEFAULT_HEADER)
    }

    pub fn log_with_header(&self, stat: &dyn RequestStat, header: &str) {
        if let Some(sink) = &self.sink {
            sink.info(&build_log_message(stat, header));
        }
    }
}

impl fmt::Debug for RequestLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestLogger")
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{build_log_message, RequestLogger, RequestStat, RequestTimings, TracingSink};
    use std::sync::{Arc, Mutex};
    use tracing_test::traced_test;

    struct TotalOnly(f64);

    impl RequestStat for TotalOnly {
        fn total_ms(&self) -> Option<f64> {
            Some(self.0)
        }
    }

    fn capture() -> (RequestLogger, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink_lines = lines.clone();
        let logger = RequestLogger::new(move |message: &str| {
            sink_lines.lock().unwrap().push(message.to_string())
        });
        (logger, lines)
    }

    #[test]
    fn test_includes_supplied_header() {
        let stat = RequestTimings::new();
        assert_eq!(build_log_message(&stat, "FOO_STATS"), "[FOO_STATS]");
    }

    #[test]
    fn test_falls_back_to_default_header() {
        let logger = RequestLogger::disabled();
        assert_eq!(logger.build_log_message(&RequestTimings::new()), "[STATSD]");
    }

    #[test]
    fn test_includes_available_stats() {
        let stat = RequestTimings::new()
            .with_total_ms(100.21)
            .with_active_record_ms(24.0);
        let logger = RequestLogger::disabled();
        assert_eq!(
            logger.build_log_message(&stat),
            "[STATSD] (total: 100.21) (active_record: 24.00)"
        );
    }

    #[test]
    fn test_skips_absent_stats() {
        let stat = RequestTimings::new().with_total_ms(100.22);
        assert_eq!(
            build_log_message(&stat, "STATSD"),
            "[STATSD] (total: 100.22)"
        );

        let stat = RequestTimings::new().with_active_record_ms(3.0);
        assert_eq!(
            build_log_message(&stat, "STATSD"),
            "[STATSD] (active_record: 3.00)"
        );
    }

    #[test]
    fn test_stat_without_sub_durations() {
        assert_eq!(
            build_log_message(&TotalOnly(5.5), "STATSD"),
            "[STATSD] (total: 5.50)"
        );
    }

    #[test]
    fn test_forces_two_decimal_precision() {
        let logger = RequestLogger::disabled();
        let stat = RequestTimings::new().with_total_ms(72.1);
        assert_eq!(logger.build_log_message(&stat), "[STATSD] (total: 72.10)");
    }

    #[test]
    fn test_rounds_to_two_decimals() {
        let logger = RequestLogger::disabled();
        let stat = RequestTimings::new().with_total_ms(72.1382928);
        assert_eq!(logger.build_log_message(&stat), "[STATSD] (total: 72.14)");
        let stat = RequestTimings::new().with_total_ms(72.1348209);
        assert_eq!(logger.build_log_message(&stat), "[STATSD] (total: 72.13)");
    }

    #[test]
    fn test_log_writes_once_to_sink() {
        let (logger, lines) = capture();
        logger.log(&RequestTimings::new());
        assert_eq!(*lines.lock().unwrap(), ["[STATSD]"]);
    }

    #[test]
    fn test_log_writes_built_message() {
        let (logger, lines) = capture();
        let stat = RequestTimings::new().with_total_ms(100.2);
        logger.log_with_header(&stat, "DEFAULT_METRICS");
        assert_eq!(
            *lines.lock().unwrap(),
            [logger.build_log_message_with_header(&stat, "DEFAULT_METRICS")]
        );
        assert_eq!(lines.lock().unwrap()[0], "[DEFAULT_METRICS] (total: 100.20)");
    }

    #[test]
    fn test_log_without_sink_is_noop() {
        let logger = RequestLogger::disabled();
        logger.log(&RequestTimings::new().with_total_ms(1.0));
        logger.log_with_header(&RequestTimings::new(), "X");
    }

    #[traced_test]
    #[test]
    fn test_tracing_sink() {
        let logger = RequestLogger::new(TracingSink);
        logger.log(&RequestTimings::new().with_total_ms(12.346));
        assert!(logs_contain("[STATSD] (total: 12.35)"));
    }
}

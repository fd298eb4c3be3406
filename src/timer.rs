use std::sync::Arc;
use std::time::Duration;

use quanta::{Clock, Instant};

use crate::client::StatsdClient;

/// Measures the time until it is stopped or dropped, then emits it as a statsd timing.
///
/// Dropping during a panic still emits, so a timed section that fails is reported too.
pub struct Timer {
    name: String,
    client: Arc<dyn StatsdClient>,
    clock: Clock,
    start: Instant,
    sample_rate: Option<f32>,
    recorded: bool,
}

impl Timer {
    pub(crate) fn new(name: String, client: Arc<dyn StatsdClient>, clock: Clock) -> Self {
        let start = clock.now();
        Self {
            name,
            client,
            clock,
            start,
            sample_rate: None,
            recorded: false,
        }
    }

    /// Sets the sample rate the timing is emitted with.
    #[must_use]
    pub fn with_sample_rate(mut self, sample_rate: f32) -> Self {
        self.sample_rate = Some(sample_rate);
        self
    }

    /// The resolved metric name this timer reports under.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn elapsed(&self) -> Duration {
        self.clock.now().duration_since(self.start)
    }

    /// Emits the timing now and returns the measured duration.
    pub fn stop(mut self) -> Duration {
        self.record()
    }

    fn record(&mut self) -> Duration {
        let elapsed = self.elapsed();
        if !self.recorded {
            self.recorded = true;
            self.client
                .timing(&self.name, as_millis_rounded(elapsed), self.sample_rate);
        }
        elapsed
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.record();
    }
}

fn as_millis_rounded(duration: Duration) -> u64 {
    (duration.as_secs_f64() * 1000.0).round() as u64
}

#[cfg(test)]
mod tests {
    use super::{as_millis_rounded, Timer};
    use crate::client::StatsdClient;
    use quanta::Clock;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Default)]
    struct Timings(Mutex<Vec<(String, u64, Option<f32>)>>);

    impl StatsdClient for Timings {
        fn count(&self, _name: &str, _delta: i64, _sample_rate: Option<f32>) {}
        fn gauge(&self, _name: &str, _value: f64, _sample_rate: Option<f32>) {}
        fn timing(&self, name: &str, ms: u64, sample_rate: Option<f32>) {
            self.0
                .lock()
                .unwrap()
                .push((name.to_string(), ms, sample_rate));
        }
    }

    #[test]
    fn test_rounds_to_millis() {
        assert_eq!(as_millis_rounded(Duration::from_micros(1499)), 1);
        assert_eq!(as_millis_rounded(Duration::from_micros(1500)), 2);
        assert_eq!(as_millis_rounded(Duration::from_secs(2)), 2000);
    }

    #[test]
    fn test_emits_once_on_drop() {
        let (clock, mock) = Clock::mock();
        let timings = Arc::new(Timings::default());

        let timer = Timer::new("render".to_string(), timings.clone(), clock);
        mock.increment(Duration::from_millis(25));
        assert_eq!(timer.elapsed(), Duration::from_millis(25));
        drop(timer);

        assert_eq!(
            *timings.0.lock().unwrap(),
            [("render".to_string(), 25, None)]
        );
    }

    #[test]
    fn test_stop_does_not_emit_twice() {
        let (clock, mock) = Clock::mock();
        let timings = Arc::new(Timings::default());

        let timer = Timer::new("render".to_string(), timings.clone(), clock).with_sample_rate(0.5);
        mock.increment(Duration::from_millis(7));
        assert_eq!(timer.stop(), Duration::from_millis(7));

        assert_eq!(
            *timings.0.lock().unwrap(),
            [("render".to_string(), 7, Some(0.5))]
        );
    }
}

use std::thread;
use std::time::Duration;

/// Throttle between two requests to the geocoding service.
pub trait Pacer {
    fn wait(&self);
}

/// Sleeps the current thread for a fixed interval.
#[derive(Copy, Clone, Debug)]
pub struct SleepPacer {
    interval: Duration,
}

impl SleepPacer {
    pub fn new(interval: Duration) -> SleepPacer {
        SleepPacer { interval }
    }
}

impl Pacer for SleepPacer {
    fn wait(&self) {
        if !self.interval.is_zero() {
            thread::sleep(self.interval);
        }
    }
}

#[derive(Copy, Clone, Debug, Default)]
pub struct NoopPacer;

impl Pacer for NoopPacer {
    fn wait(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn sleep_pacer_waits_at_least_interval() {
        let pacer = SleepPacer::new(Duration::from_millis(20));
        let start = Instant::now();
        pacer.wait();
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn zero_interval_returns_immediately() {
        let pacer = SleepPacer::new(Duration::ZERO);
        let start = Instant::now();
        pacer.wait();
        NoopPacer.wait();
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}

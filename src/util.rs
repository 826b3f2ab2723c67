use std::{
    thread,
    time::{Duration, Instant},
};

/*
 * An Interval spaces the start of each iteration of a loop a fixed duration apart
 *
 * Every sleep is shortened by the time spent since the previous sleep returned and by however long
 * the previous sleep overshot, so the loop body and sleep inaccuracy do not accumulate as drift
 *
 * Deviations longer than one interval are dropped instead of being paid back over several intervals,
 * a long stall is followed by one short iteration and then the regular cadence resumes
 */

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum IntervalAccuracy {
    Default,
    High,
}

pub struct Interval {
    // interval name
    name: &'static str,

    // desired duration of interval
    pub interval: Duration,

    // longest stretch we may go without sleeping at all, so a slow loop body cannot starve other threads
    max_quantum: Duration,

    // instant last sleep was complete
    task_start: Instant,

    // how much we overslept by
    oversleep_duration: Duration,

    // how long weve gone since an actual sleep
    quantum_duration: Duration,

    accuracy: IntervalAccuracy,
}

impl Interval {
    pub fn new(
        name: &'static str,
        interval: Duration,
        max_quantum: Duration,
        accuracy: IntervalAccuracy,
    ) -> Self {
        Interval {
            name,
            interval,
            max_quantum,
            task_start: Instant::now(),
            oversleep_duration: Duration::ZERO,
            quantum_duration: Duration::ZERO,
            accuracy,
        }
    }

    pub fn from_frequency(
        name: &'static str,
        frequency: u32,
        max_quantum: Duration,
        accuracy: IntervalAccuracy,
    ) -> Self {
        Interval::new(
            name,
            Duration::from_secs_f64(1.0 / frequency.max(1) as f64),
            max_quantum,
            accuracy,
        )
    }

    pub fn reset(&mut self) {
        self.task_start = Instant::now();
        self.oversleep_duration = Duration::ZERO;
        self.quantum_duration = Duration::ZERO;
    }

    pub fn sleep(&mut self) {
        let task_duration = self.task_start.elapsed(); // time since the end of our last sleep

        self.quantum_duration += task_duration;

        let mut sleep_duration = self
            .interval
            .saturating_sub(task_duration)
            .saturating_sub(self.oversleep_duration);

        // nothing left to sleep and we are still within our quantum
        if sleep_duration.is_zero() && self.quantum_duration < self.max_quantum {
            self.oversleep_duration = Duration::ZERO;
        } else {
            // past our quantum we must yield for at least a moment
            if sleep_duration.is_zero() {
                sleep_duration = Duration::from_nanos(1);
            }

            let now = Instant::now();

            if self.accuracy == IntervalAccuracy::High {
                spin_sleep::sleep(sleep_duration);
            } else {
                thread::sleep(sleep_duration);
            }

            self.oversleep_duration = now.elapsed().saturating_sub(sleep_duration);
            self.quantum_duration = Duration::ZERO;
        }

        log::trace!(
            "interval {}: task {} us, sleep {} us, oversleep {} us",
            self.name,
            task_duration.as_micros(),
            sleep_duration.as_micros(),
            self.oversleep_duration.as_micros()
        );

        self.task_start = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_spaces_iterations_apart() {
        let mut interval = Interval::new(
            "test",
            Duration::from_millis(5),
            Duration::from_millis(5),
            IntervalAccuracy::Default,
        );

        let start = Instant::now();
        for _ in 0..3 {
            interval.sleep();
        }
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn frequency_converts_to_period() {
        let interval = Interval::from_frequency(
            "test",
            60,
            Duration::from_millis(8),
            IntervalAccuracy::High,
        );
        assert_eq!(interval.interval, Duration::from_secs_f64(1.0 / 60.0));
    }
}

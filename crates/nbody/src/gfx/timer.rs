use std::time::{Duration, Instant};

/// Frame timer. In fixed-step mode [`StepTimer::tick`] reports how many whole steps
/// of the configured length elapsed since the previous tick; otherwise every tick is
/// one step of variable length.
pub struct StepTimer {
    last_tick: Instant,
    elapsed: Duration,
    total: Duration,
    frame_count: u64,

    fixed_step: Option<Duration>,
    leftover: Duration,

    frames_this_second: u32,
    second_counter: Duration,
    frames_per_second: u32,
}

// a debugger pause must not turn into thousands of catch-up steps
const MAX_DELTA: Duration = Duration::from_millis(100);

impl StepTimer {
    pub fn new(fixed_step: Option<Duration>) -> Self {
        Self::starting_at(Instant::now(), fixed_step)
    }

    pub fn starting_at(now: Instant, fixed_step: Option<Duration>) -> Self {
        Self {
            last_tick: now,
            elapsed: Duration::ZERO,
            total: Duration::ZERO,
            frame_count: 0,
            fixed_step: fixed_step.filter(|step| !step.is_zero()),
            leftover: Duration::ZERO,
            frames_this_second: 0,
            second_counter: Duration::ZERO,
            frames_per_second: 0,
        }
    }

    pub fn tick(&mut self) -> u32 {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> u32 {
        let delta = now.saturating_duration_since(self.last_tick).min(MAX_DELTA);
        self.last_tick = now;

        self.frames_this_second += 1;
        self.second_counter += delta;
        if self.second_counter >= Duration::from_secs(1) {
            self.frames_per_second = self.frames_this_second;
            self.frames_this_second = 0;
            self.second_counter -= Duration::from_secs(1);
        }

        let Some(step) = self.fixed_step else {
            self.elapsed = delta;
            self.total += delta;
            self.frame_count += 1;
            return 1;
        };

        self.leftover += delta;
        let mut steps = 0;
        while self.leftover >= step {
            self.leftover -= step;
            self.total += step;
            self.frame_count += 1;
            steps += 1;
        }
        self.elapsed = step;
        steps
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    pub fn total_seconds(&self) -> f64 {
        self.total.as_secs_f64()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn frames_per_second(&self) -> u32 {
        self.frames_per_second
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variable_step_ticks_once() {
        let start = Instant::now();
        let mut timer = StepTimer::starting_at(start, None);

        assert_eq!(timer.tick_at(start + Duration::from_millis(16)), 1);
        assert_eq!(timer.tick_at(start + Duration::from_millis(40)), 1);
        assert_eq!(timer.frame_count(), 2);
        assert!((timer.elapsed_seconds() - 0.024).abs() < 1e-9);
        assert!((timer.total_seconds() - 0.040).abs() < 1e-9);
    }

    #[test]
    fn fixed_step_accumulates_leftover() {
        let start = Instant::now();
        let step = Duration::from_millis(10);
        let mut timer = StepTimer::starting_at(start, Some(step));

        assert_eq!(timer.tick_at(start + Duration::from_millis(5)), 0);
        assert_eq!(timer.tick_at(start + Duration::from_millis(25)), 2);
        assert_eq!(timer.tick_at(start + Duration::from_millis(30)), 1);
        assert_eq!(timer.frame_count(), 3);
        assert!((timer.total_seconds() - 0.030).abs() < 1e-9);
    }

    #[test]
    fn long_pauses_are_clamped() {
        let start = Instant::now();
        let step = Duration::from_millis(10);
        let mut timer = StepTimer::starting_at(start, Some(step));

        assert_eq!(timer.tick_at(start + Duration::from_secs(5)), 10);
    }

    #[test]
    fn counts_frames_per_second() {
        let start = Instant::now();
        let mut timer = StepTimer::starting_at(start, None);

        for i in 1..=20 {
            timer.tick_at(start + Duration::from_millis(50 * i));
        }
        assert_eq!(timer.frames_per_second(), 20);
    }

    #[test]
    fn zero_fixed_step_means_variable() {
        let start = Instant::now();
        let mut timer = StepTimer::starting_at(start, Some(Duration::ZERO));
        assert_eq!(timer.tick_at(start), 1);
    }
}

use std::time::{Duration, Instant};

/// Timing of one frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FrameTime {
    /// Seconds since the previous tick, clamped.
    pub dt: f32,
    /// Seconds since the clock started, summed from clamped deltas.
    pub elapsed: f32,
    pub frame_index: u64,
}

/// Per-window frame clock.
///
/// Deltas are clamped so a stalled or suspended window doesn't hand game code
/// a multi-second step.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Option<Instant>,
    elapsed: f32,
    frame_index: u64,
    dt_min: Duration,
    dt_max: Duration,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::with_clamps(Duration::from_micros(100), Duration::from_millis(250))
    }

    pub fn with_clamps(dt_min: Duration, dt_max: Duration) -> Self {
        debug_assert!(dt_min <= dt_max);
        Self { last: None, elapsed: 0.0, frame_index: 0, dt_min, dt_max }
    }

    /// Forgets the previous tick; the next one reports `dt_min`.
    pub fn reset(&mut self) {
        self.last = None;
    }

    pub fn tick(&mut self) -> FrameTime {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> FrameTime {
        let dt = match self.last {
            Some(last) => now.saturating_duration_since(last).clamp(self.dt_min, self.dt_max),
            None => self.dt_min,
        };
        self.last = Some(now);
        self.elapsed += dt.as_secs_f32();

        let ft = FrameTime { dt: dt.as_secs_f32(), elapsed: self.elapsed, frame_index: self.frame_index };
        self.frame_index = self.frame_index.wrapping_add(1);
        ft
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_uses_minimum_delta() {
        let mut clock = FrameClock::new();
        let ft = clock.tick_at(Instant::now());
        assert_eq!(ft.frame_index, 0);
        assert!((ft.dt - 0.0001).abs() < 1e-6);
    }

    #[test]
    fn deltas_are_clamped_and_accumulated() {
        let mut clock = FrameClock::new();
        let t0 = Instant::now();
        clock.tick_at(t0);

        let ft = clock.tick_at(t0 + Duration::from_millis(16));
        assert!((ft.dt - 0.016).abs() < 1e-4);
        assert_eq!(ft.frame_index, 1);

        let ft = clock.tick_at(t0 + Duration::from_secs(10));
        assert!((ft.dt - 0.25).abs() < 1e-6);
        assert!((ft.elapsed - (0.0001 + 0.016 + 0.25)).abs() < 1e-4);
    }

    #[test]
    fn reset_drops_the_baseline() {
        let mut clock = FrameClock::new();
        let t0 = Instant::now();
        clock.tick_at(t0);
        clock.reset();
        let ft = clock.tick_at(t0 + Duration::from_millis(100));
        assert!((ft.dt - 0.0001).abs() < 1e-6);
    }
}

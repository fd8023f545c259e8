/// Hierarchical simulation clock: hour, dispatch interval, AGC interval, second.
///
/// Each call to [`SimulationClock::tick`] yields the second about to be
/// simulated together with the boundaries that second crosses. Within an
/// hour `second` counts up from zero; it resets when the hour rolls over.
///
/// # Examples
///
/// ```
/// use agc_cosim::sim::clock::SimulationClock;
///
/// let mut clock = SimulationClock::new(1, 8, 4, 2);
/// let mut dispatch = Vec::new();
///
/// clock.run(|tick| dispatch.push(tick.dispatch_boundary));
/// assert_eq!(dispatch, vec![true, false, false, false, true, false, false, false]);
/// ```
#[derive(Debug, Clone)]
pub struct SimulationClock {
    hour: usize,
    dispatch_interval_id: usize,
    agc_interval_id: usize,
    second: usize,
    elapsed: usize,
    total_hours: usize,
    seconds_per_hour: usize,
    dispatch_interval_s: usize,
    agc_interval_s: usize,
}

/// One step of the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub hour: usize,
    /// Second within the hour.
    pub second: usize,
    /// Seconds elapsed since the start of the run.
    pub elapsed: usize,
    pub dispatch_interval_id: usize,
    pub agc_interval_id: usize,
    pub hour_boundary: bool,
    pub dispatch_boundary: bool,
    pub agc_boundary: bool,
}

impl SimulationClock {
    /// Creates a clock covering `total_hours` hours of `seconds_per_hour` seconds.
    ///
    /// # Panics
    ///
    /// Panics if `seconds_per_hour`, `dispatch_interval_s`, or `agc_interval_s` is zero.
    pub fn new(
        total_hours: usize,
        seconds_per_hour: usize,
        dispatch_interval_s: usize,
        agc_interval_s: usize,
    ) -> Self {
        assert!(seconds_per_hour > 0, "seconds_per_hour must be > 0");
        assert!(dispatch_interval_s > 0, "dispatch_interval_s must be > 0");
        assert!(agc_interval_s > 0, "agc_interval_s must be > 0");
        Self {
            hour: 0,
            dispatch_interval_id: 0,
            agc_interval_id: 0,
            second: 0,
            elapsed: 0,
            total_hours,
            seconds_per_hour,
            dispatch_interval_s,
            agc_interval_s,
        }
    }

    /// Total seconds the clock will run.
    pub fn total_seconds(&self) -> usize {
        self.total_hours * self.seconds_per_hour
    }

    /// Advances the clock by one second.
    ///
    /// # Returns
    ///
    /// * `Some(tick)` - The second to simulate and the boundaries it crosses
    /// * `None` - If every hour has been simulated
    pub fn tick(&mut self) -> Option<Tick> {
        if self.elapsed >= self.total_seconds() {
            return None;
        }

        let hour_boundary = self.second == 0;
        let dispatch_boundary = self.second % self.dispatch_interval_s == 0;
        let agc_boundary = self.second % self.agc_interval_s == 0;

        if hour_boundary && self.elapsed > 0 {
            self.hour += 1;
            self.dispatch_interval_id = 0;
        } else if dispatch_boundary && self.second > 0 {
            self.dispatch_interval_id += 1;
        }
        if dispatch_boundary {
            self.agc_interval_id = 0;
        } else if agc_boundary {
            self.agc_interval_id += 1;
        }

        let tick = Tick {
            hour: self.hour,
            second: self.second,
            elapsed: self.elapsed,
            dispatch_interval_id: self.dispatch_interval_id,
            agc_interval_id: self.agc_interval_id,
            hour_boundary,
            dispatch_boundary,
            agc_boundary,
        };

        self.elapsed += 1;
        self.second = (self.second + 1) % self.seconds_per_hour;
        Some(tick)
    }

    /// Runs a function for each remaining second.
    pub fn run(&mut self, mut f: impl FnMut(Tick)) {
        while let Some(tick) = self.tick() {
            f(tick);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_seconds() {
        let clock = SimulationClock::new(2, 301, 300, 4);
        assert_eq!(clock.total_seconds(), 602);
    }

    #[test]
    fn test_tick_exhausts() {
        let mut clock = SimulationClock::new(1, 2, 1, 1);
        assert!(clock.tick().is_some());
        assert!(clock.tick().is_some());
        assert_eq!(clock.tick(), None);
    }

    #[test]
    fn test_empty_clock() {
        let mut clock = SimulationClock::new(0, 3600, 300, 4);
        let mut was_called = false;
        clock.run(|_| was_called = true);
        assert!(!was_called);
    }

    #[test]
    fn second_resets_at_hour_boundary() {
        let mut clock = SimulationClock::new(2, 10, 5, 2);
        let mut ticks = Vec::new();
        clock.run(|t| ticks.push(t));

        assert_eq!(ticks.len(), 20);
        assert_eq!(ticks[9].second, 9);
        assert_eq!(ticks[10].second, 0);
        assert_eq!(ticks[10].hour, 1);
        assert!(ticks[10].hour_boundary);
        assert_eq!(ticks[10].elapsed, 10);
        assert_eq!(ticks.iter().filter(|t| t.hour_boundary).count(), 2);
    }

    #[test]
    fn interval_ids_follow_boundaries() {
        let mut clock = SimulationClock::new(2, 12, 6, 4);
        let mut ticks = Vec::new();
        clock.run(|t| ticks.push(t));

        for t in &ticks {
            assert_eq!(t.dispatch_boundary, t.second % 6 == 0);
            assert_eq!(t.agc_boundary, t.second % 4 == 0);
        }
        // dispatch ids within hour 0: 0 for seconds 0..6, 1 for 6..12
        assert_eq!(ticks[5].dispatch_interval_id, 0);
        assert_eq!(ticks[6].dispatch_interval_id, 1);
        // reset at the next hour
        assert_eq!(ticks[12].dispatch_interval_id, 0);
        // agc id resets at the dispatch boundary at second 6
        assert_eq!(ticks[4].agc_interval_id, 1);
        assert_eq!(ticks[6].agc_interval_id, 0);
        assert_eq!(ticks[8].agc_interval_id, 1);
    }

    #[test]
    fn truncated_hour_still_dispatches_at_zero() {
        // 301-second hours with 300-second dispatch: boundaries at 0 and 300
        let mut clock = SimulationClock::new(1, 301, 300, 4);
        let mut boundaries = Vec::new();
        clock.run(|t| {
            if t.dispatch_boundary {
                boundaries.push(t.second);
            }
        });
        assert_eq!(boundaries, vec![0, 300]);
    }
}

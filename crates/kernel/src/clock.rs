/// Fixed-timestep accumulator.
///
/// Frame deltas go in, a whole number of fixed steps comes out. Leftover time
/// carries into the next frame; steps beyond `max_substeps` are dropped so a
/// long stall cannot spiral.
#[derive(Debug, Clone)]
pub struct FixedStepClock {
    step: f64,
    max_substeps: u32,
    accumulator: f64,
    elapsed: f64,
    steps: u64,
}

impl FixedStepClock {
    pub fn new(step: f64, max_substeps: u32) -> Self {
        Self {
            step: step.max(f64::EPSILON),
            max_substeps: max_substeps.max(1),
            accumulator: 0.0,
            elapsed: 0.0,
            steps: 0,
        }
    }

    /// 60 Hz with at most 10 catch-up steps per frame.
    pub fn sixty_hz() -> Self {
        Self::new(1.0 / 60.0, 10)
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    /// Total time fed in, including dropped steps.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Total fixed steps produced so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Fraction of a step currently buffered, for interpolation.
    pub fn alpha(&self) -> f64 {
        self.accumulator / self.step
    }

    /// Feed a frame delta; returns how many fixed steps to run this frame.
    pub fn advance(&mut self, dt: f64) -> u32 {
        let dt = dt.max(0.0);
        self.elapsed += dt;
        self.accumulator += dt;

        let mut n = 0;
        while self.accumulator >= self.step && n < self.max_substeps {
            self.accumulator -= self.step;
            n += 1;
        }
        if n == self.max_substeps && self.accumulator >= self.step {
            tracing::debug!(
                dropped = self.accumulator / self.step,
                "fixed-step clock fell behind, dropping steps"
            );
            self.accumulator %= self.step;
        }
        self.steps += n as u64;
        n
    }
}

impl Default for FixedStepClock {
    fn default() -> Self {
        Self::sixty_hz()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_steps_are_emitted() {
        let mut clock = FixedStepClock::new(0.01, 10);
        assert_eq!(clock.advance(0.025), 2);
        assert!((clock.alpha() - 0.5).abs() < 1e-6);
        assert_eq!(clock.advance(0.006), 1);
        assert_eq!(clock.steps(), 3);
    }

    #[test]
    fn long_stall_is_capped() {
        let mut clock = FixedStepClock::new(0.01, 4);
        assert_eq!(clock.advance(1.0), 4);
        assert!(clock.alpha() < 1.0);
    }

    #[test]
    fn negative_delta_is_ignored() {
        let mut clock = FixedStepClock::sixty_hz();
        assert_eq!(clock.advance(-1.0), 0);
        assert_eq!(clock.elapsed(), 0.0);
    }
}

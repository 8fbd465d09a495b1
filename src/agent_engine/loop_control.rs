/// Hard upper bound on orchestration iterations per run.
pub const DEFAULT_MAX_STEPS: u32 = 20;

/// Decides when a run must stop because of the step ceiling.
#[derive(Debug, Clone, Copy)]
pub struct LoopController {
    max_steps: u32,
}

impl LoopController {
    pub fn new(max_steps: u32) -> Self {
        // A zero ceiling would never let the first perception run.
        Self {
            max_steps: max_steps.max(1),
        }
    }

    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    /// True once `step` (1-based, already incremented by Perceive) hits the ceiling.
    pub fn reached(&self, step: u32) -> bool {
        step >= self.max_steps
    }
}

impl Default for LoopController {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_STEPS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceiling_is_inclusive() {
        let ctl = LoopController::default();
        assert!(!ctl.reached(19));
        assert!(ctl.reached(20));
        assert!(ctl.reached(21));
    }

    #[test]
    fn zero_is_clamped() {
        assert_eq!(LoopController::new(0).max_steps(), 1);
    }
}

//! Stitches receding-horizon solutions into one full-horizon warm start.
//!
//! The splicer holds the "currently believed" full-horizon solution. Each
//! new short-horizon solve refines its suffix: the prefix already executed
//! (or about to be) is kept, and everything from the splice time onward is
//! overwritten with the freshly solved trajectory, aligned by time.

use gameplan_core::operating_point::OperatingPoint;
use gameplan_core::strategy::Strategy;
use gameplan_solver::log::SolverLog;
use tracing::debug;

/// Owner of the stitched full-horizon operating point and strategies.
pub struct SolutionSplicer {
    time_step: f64,
    operating_point: OperatingPoint,
    strategies: Vec<Strategy>,
}

impl SolutionSplicer {
    /// Seed the splicer from the final iterate of an initial solve.
    #[must_use]
    pub fn new(log: &SolverLog) -> Self {
        Self {
            time_step: log.time_step(),
            operating_point: log.final_operating_point().clone(),
            strategies: log.final_strategies().to_vec(),
        }
    }

    /// The stitched operating point.
    #[must_use]
    pub fn current_operating_point(&self) -> &OperatingPoint {
        &self.operating_point
    }

    /// The stitched strategies.
    #[must_use]
    pub fn current_strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    /// Graft the final iterate of `log` onto the held solution at
    /// `t_splice`.
    ///
    /// Keeps the prefix strictly before the splice index and overwrites from
    /// there on with new entries aligned by time; entries of the new
    /// solution beyond the held horizon are dropped, and held entries beyond
    /// the new solution's reach are kept. Length and time grid never change.
    pub fn splice(&mut self, log: &SolverLog, t_splice: f64) {
        let new_op = log.final_operating_point();
        let new_strategies = log.final_strategies();
        let dt = self.time_step;
        let len = self.operating_point.len();

        let k_star = self.operating_point.index_at_or_before(t_splice, dt);

        // Index into the new solution whose time matches slot k_star.
        #[allow(clippy::cast_possible_truncation)]
        let offset = ((self.operating_point.time_of(k_star, dt) - new_op.t0) / dt).round()
            as isize;
        debug!(t_splice, k_star, offset, "splicing new solution");

        for slot in k_star..len {
            #[allow(clippy::cast_possible_wrap)]
            let source = offset + (slot - k_star) as isize;
            if source < 0 {
                continue;
            }
            #[allow(clippy::cast_sign_loss)]
            let source = source as usize;
            if source >= new_op.len() {
                break;
            }
            self.operating_point.xs[slot] = new_op.xs[source].clone();
            self.operating_point.us[slot] = new_op.us[source].clone();
            for (strategy, new_strategy) in
                self.strategies.iter_mut().zip(new_strategies.iter())
            {
                strategy.ps[slot] = new_strategy.ps[source].clone();
                strategy.alphas[slot] = new_strategy.alphas[source].clone();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use gameplan_solver::log::SolverIterate;

    /// Log whose single iterate ramps linearly from `base` with start time
    /// `t0`.
    fn ramp_log(num_steps: usize, t0: f64, base: f64) -> SolverLog {
        let mut op = OperatingPoint::zeros(num_steps, 1, &[1], t0);
        for k in 0..num_steps {
            #[allow(clippy::cast_precision_loss)]
            {
                op.xs[k][0] = base + k as f64;
                op.us[k][0][0] = base + k as f64 + 0.5;
            }
        }
        let mut strategies = vec![Strategy::zeros(num_steps, 1, 1)];
        for k in 0..num_steps {
            strategies[0].alphas[k][0] = base + k as f64;
        }
        let mut log = SolverLog::new(0.1);
        log.push(SolverIterate {
            operating_point: op,
            strategies,
            player_costs: vec![0.0],
            step_size: 1.0,
            cumulative_runtime: 0.0,
        });
        log
    }

    #[test]
    fn new_copies_final_iterate() {
        let log = ramp_log(10, 0.0, 0.0);
        let splicer = SolutionSplicer::new(&log);
        assert_eq!(splicer.current_operating_point().len(), 10);
        assert_relative_eq!(splicer.current_operating_point().xs[3][0], 3.0);
    }

    #[test]
    fn splice_preserves_length_and_grid() {
        let log = ramp_log(10, 0.0, 0.0);
        let mut splicer = SolutionSplicer::new(&log);

        let new_log = ramp_log(7, 0.3, 100.0);
        splicer.splice(&new_log, 0.3);

        let op = splicer.current_operating_point();
        assert_eq!(op.len(), 10);
        assert_relative_eq!(op.t0, 0.0);
        for k in 0..10 {
            #[allow(clippy::cast_precision_loss)]
            let expected = 0.1 * k as f64;
            assert_relative_eq!(op.time_of(k, 0.1), expected);
        }
        assert_eq!(splicer.current_strategies()[0].len(), 10);
    }

    #[test]
    fn splice_keeps_prefix_and_overwrites_suffix() {
        let log = ramp_log(10, 0.0, 0.0);
        let mut splicer = SolutionSplicer::new(&log);

        // New solution starts at t = 0.3, i.e. slot 3.
        let new_log = ramp_log(7, 0.3, 100.0);
        splicer.splice(&new_log, 0.3);

        let op = splicer.current_operating_point();
        // Prefix untouched.
        assert_relative_eq!(op.xs[0][0], 0.0);
        assert_relative_eq!(op.xs[2][0], 2.0);
        // Join slot equals the new solution's first state.
        assert_relative_eq!(op.xs[3][0], 100.0, epsilon = 1e-6);
        // Suffix comes from the new solution.
        assert_relative_eq!(op.xs[9][0], 106.0);
        assert_relative_eq!(splicer.current_strategies()[0].alphas[9][0], 106.0);
    }

    #[test]
    fn splice_between_grid_points_joins_at_or_before() {
        let log = ramp_log(10, 0.0, 0.0);
        let mut splicer = SolutionSplicer::new(&log);

        let new_log = ramp_log(7, 0.3, 100.0);
        // Splice time just after slot 3.
        splicer.splice(&new_log, 0.34);

        let op = splicer.current_operating_point();
        assert_relative_eq!(op.xs[2][0], 2.0);
        assert_relative_eq!(op.xs[3][0], 100.0);
    }

    #[test]
    fn splice_short_new_solution_keeps_tail() {
        let log = ramp_log(10, 0.0, 0.0);
        let mut splicer = SolutionSplicer::new(&log);

        // Only three new steps: slots 2..5 get overwritten, 5.. stay.
        let new_log = ramp_log(3, 0.2, 100.0);
        splicer.splice(&new_log, 0.2);

        let op = splicer.current_operating_point();
        assert_relative_eq!(op.xs[2][0], 100.0);
        assert_relative_eq!(op.xs[4][0], 102.0);
        assert_relative_eq!(op.xs[5][0], 5.0);
        assert_relative_eq!(op.xs[9][0], 9.0);
    }

    #[test]
    fn splice_future_anchored_solution_skips_until_its_start() {
        let log = ramp_log(10, 0.0, 0.0);
        let mut splicer = SolutionSplicer::new(&log);

        // New solution starts at t = 0.5 but the splice time is 0.3: slots
        // 3 and 4 keep the held values, 5.. take the new ones.
        let new_log = ramp_log(5, 0.5, 100.0);
        splicer.splice(&new_log, 0.3);

        let op = splicer.current_operating_point();
        assert_relative_eq!(op.xs[3][0], 3.0);
        assert_relative_eq!(op.xs[4][0], 4.0);
        assert_relative_eq!(op.xs[5][0], 100.0);
        assert_relative_eq!(op.xs[9][0], 104.0);
    }

    #[test]
    fn splice_join_state_continuity() {
        let log = ramp_log(10, 0.0, 0.0);
        let mut splicer = SolutionSplicer::new(&log);

        let new_log = ramp_log(7, 0.3, 100.0);
        splicer.splice(&new_log, 0.3);

        // The overwritten join slot is exactly the new solution's entry 0.
        let join = &splicer.current_operating_point().xs[3];
        let expected = &new_log.final_operating_point().xs[0];
        assert_relative_eq!((join - expected).amax(), 0.0, epsilon = 1e-6);
    }
}

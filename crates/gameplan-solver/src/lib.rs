// gameplan-solver: LQ feedback-game solver and iterative LQ outer loop.

pub mod ilq_solver;
pub mod log;
pub mod lq_solver;
pub mod nash;
pub mod problem;
pub mod rollout;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        ilq_solver::IlqSolver,
        log::{SolverIterate, SolverLog, TerminationReason},
        lq_solver::LqFeedbackSolver,
        nash::random_check_local_nash,
        problem::Problem,
        rollout::{rollout, total_player_costs},
    };
}

//! Shared dimension bookkeeping for multi-player games.

use serde::{Deserialize, Serialize};

/// Index identifying a player, `0..num_players`.
pub type PlayerIndex = usize;

// ---------------------------------------------------------------------------
// GameDims
// ---------------------------------------------------------------------------

/// State and control dimensions of a game.
///
/// Player block ordering is fixed (ascending index) across every stacked
/// matrix built from these dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameDims {
    /// Concatenated state dimension `n`.
    pub x_dim: usize,
    /// Per-player control dimensions `u_i`.
    pub u_dims: Vec<usize>,
}

impl GameDims {
    /// Create dimensions for `x_dim` states and the given per-player control
    /// dimensions.
    #[must_use]
    pub fn new(x_dim: usize, u_dims: Vec<usize>) -> Self {
        Self { x_dim, u_dims }
    }

    /// Number of players.
    #[must_use]
    pub fn num_players(&self) -> usize {
        self.u_dims.len()
    }

    /// Control dimension of one player.
    #[must_use]
    pub fn u_dim(&self, player: PlayerIndex) -> usize {
        self.u_dims[player]
    }

    /// Sum of all control dimensions, `U`.
    #[must_use]
    pub fn total_u_dim(&self) -> usize {
        self.u_dims.iter().sum()
    }

    /// Row offset of player `i`'s block in a matrix stacked by player.
    #[must_use]
    pub fn u_offset(&self, player: PlayerIndex) -> usize {
        self.u_dims[..player].iter().sum()
    }
}

//! Engine tuning knobs.

use serde::{Deserialize, Serialize};

/// Runtime configuration for [`crate::engine::SimulationEngine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// A* node expansions an actor may spend per tick while planning.
    pub path_budget_per_tick: usize,
    /// Per-axis split factor for each spatial tree level, root first.
    pub spatial_branching: Vec<u32>,
    /// Upper bound on same-tick state pops and pushes for one actor.
    pub max_transitions_per_tick: usize,
    /// Ticks an idle actor waits before scanning for work again.
    pub idle_rescan_delay: u64,
    /// Duration used for actions missing from the timing table.
    pub default_action_ticks: u64,
    /// Record change notifications into the engine's change log.
    pub record_changes: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            path_budget_per_tick: 64,
            spatial_branching: vec![4, 4],
            max_transitions_per_tick: 16,
            idle_rescan_delay: 1,
            default_action_ticks: 1,
            record_changes: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: SimConfig = serde_json::from_str(r#"{ "path_budget_per_tick": 8 }"#).unwrap();
        assert_eq!(config.path_budget_per_tick, 8);
        assert_eq!(config.spatial_branching, vec![4, 4]);
        assert_eq!(config.idle_rescan_delay, 1);
    }
}

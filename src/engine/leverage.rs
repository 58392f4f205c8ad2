use serde::{Deserialize, Serialize};

pub const TIER_COUNT: usize = 4;

/// One leverage tier of the assumed position population.
///
/// These are heuristic parameters, not market-derived facts; callers may
/// supply their own table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LeverageTier {
    pub leverage: u32,
    /// Expected liquidation distance from entry, as a fraction of price.
    pub target_distance: f64,
    /// Share of the leveraged population assumed at this tier.
    pub population_share: f64,
    /// Boost applied where trade volume concentrates on the tier's levels.
    pub volume_multiplier: f64,
}

impl LeverageTier {
    /// Band of relative distances this tier owns: `[half target, target]`.
    /// Levels closer than half the target or farther than the target get
    /// nothing from this tier; the hard edges produce the characteristic
    /// ring shape of liquidation heatmaps.
    pub fn distance_band(&self) -> (f64, f64) {
        (0.5 * self.target_distance, self.target_distance)
    }

    pub fn owns(&self, distance: f64) -> bool {
        let (low, high) = self.distance_band();
        distance >= low && distance <= high
    }
}

#[derive(Debug, Clone)]
pub struct LeverageModel {
    tiers: [LeverageTier; TIER_COUNT],
}

impl Default for LeverageModel {
    fn default() -> Self {
        Self::new([
            LeverageTier {
                leverage: 10,
                target_distance: 0.10,
                population_share: 0.40,
                volume_multiplier: 0.10,
            },
            LeverageTier {
                leverage: 25,
                target_distance: 0.06,
                population_share: 0.30,
                volume_multiplier: 0.15,
            },
            LeverageTier {
                leverage: 50,
                target_distance: 0.03,
                population_share: 0.20,
                volume_multiplier: 0.20,
            },
            LeverageTier {
                leverage: 100,
                target_distance: 0.015,
                population_share: 0.10,
                volume_multiplier: 0.25,
            },
        ])
    }
}

impl LeverageModel {
    pub fn new(tiers: [LeverageTier; TIER_COUNT]) -> Self {
        Self { tiers }
    }

    pub fn tiers(&self) -> &[LeverageTier; TIER_COUNT] {
        &self.tiers
    }
}

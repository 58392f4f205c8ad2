use serde::{Deserialize, Serialize};

use super::leverage::TIER_COUNT;
use crate::store::events::DataSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

/// Per-tier, per-side estimated liquidation notional, parallel to the price
/// grid, plus the two outward cumulative curves. Built fresh on every
/// prediction request and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationMatrix {
    pub long: [Vec<f64>; TIER_COUNT],
    pub short: [Vec<f64>; TIER_COUNT],
    /// Running sum walking upward in price from the grid midpoint.
    pub cumulative_long: Vec<f64>,
    /// Running sum walking downward in price from the grid midpoint.
    pub cumulative_short: Vec<f64>,
}

impl LiquidationMatrix {
    pub fn zeroed(levels: usize) -> Self {
        Self {
            long: std::array::from_fn(|_| vec![0.0; levels]),
            short: std::array::from_fn(|_| vec![0.0; levels]),
            cumulative_long: Vec::new(),
            cumulative_short: Vec::new(),
        }
    }

    pub fn levels(&self) -> usize {
        self.long[0].len()
    }

    pub fn bucket_mut(&mut self, side: Side, tier: usize) -> &mut Vec<f64> {
        match side {
            Side::Long => &mut self.long[tier],
            Side::Short => &mut self.short[tier],
        }
    }

    pub fn scale_side(&mut self, side: Side, factor: f64) {
        let buckets = match side {
            Side::Long => &mut self.long,
            Side::Short => &mut self.short,
        };
        for tier in buckets.iter_mut() {
            for value in tier.iter_mut() {
                *value *= factor;
            }
        }
    }

    pub fn scale_all(&mut self, factor: f64) {
        self.scale_side(Side::Long, factor);
        self.scale_side(Side::Short, factor);
    }

    /// Fold tier buckets into the cumulative curves, walking outward from the
    /// grid midpoint: longs accumulate toward higher prices, shorts toward
    /// lower prices. Both curves are non-decreasing along their walk.
    pub fn fold_cumulative(&mut self, midpoint: usize) {
        let levels = self.levels();
        self.cumulative_long = vec![0.0; levels];
        self.cumulative_short = vec![0.0; levels];
        if levels == 0 {
            return;
        }
        let midpoint = midpoint.min(levels - 1);
        let mut running = 0.0;
        for i in midpoint..levels {
            running += level_total(&self.long, i);
            self.cumulative_long[i] = running;
        }
        running = 0.0;
        for i in (0..=midpoint).rev() {
            running += level_total(&self.short, i);
            self.cumulative_short[i] = running;
        }
    }
}

fn level_total(tiers: &[Vec<f64>; TIER_COUNT], index: usize) -> f64 {
    tiers.iter().map(|bucket| bucket[index]).sum()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionMetadata {
    pub trades_used: usize,
    pub snapshots_used: usize,
    pub open_interest_events: usize,
    pub funding_rate_events: usize,
    pub long_short_events: usize,
    pub data_source: DataSource,
    /// Set when the record was synthesized from the leverage table alone,
    /// with no real trade history behind it. Presentation layers must flag
    /// such records as degraded.
    pub is_basic_prediction: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub current_price: f64,
    pub price_levels: Vec<f64>,
    pub liquidation_data: LiquidationMatrix,
    /// Epoch milliseconds; doubles as the store key.
    pub timestamp: i64,
    pub metadata: PredictionMetadata,
}

/// Deliberately permissive: a degraded, nearly-all-zero matrix still counts
/// as a valid prediction.
pub fn validate_prediction(record: &PredictionRecord) -> bool {
    if record.price_levels.is_empty() {
        return false;
    }
    let matrix = &record.liquidation_data;
    if matrix.cumulative_long.is_empty() || matrix.cumulative_short.is_empty() {
        return false;
    }
    matrix
        .long
        .iter()
        .chain(matrix.short.iter())
        .flat_map(|bucket| bucket.iter())
        .any(|v| v.is_finite() && *v >= 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with(matrix: LiquidationMatrix, levels: Vec<f64>) -> PredictionRecord {
        PredictionRecord {
            current_price: 100.0,
            price_levels: levels,
            liquidation_data: matrix,
            timestamp: 1,
            metadata: PredictionMetadata {
                trades_used: 0,
                snapshots_used: 0,
                open_interest_events: 0,
                funding_rate_events: 0,
                long_short_events: 0,
                data_source: DataSource::Real,
                is_basic_prediction: false,
            },
        }
    }

    #[test]
    fn cumulative_curves_walk_outward() {
        let mut matrix = LiquidationMatrix::zeroed(5);
        matrix.long[0] = vec![9.0, 9.0, 1.0, 2.0, 3.0];
        matrix.short[1] = vec![4.0, 5.0, 6.0, 9.0, 9.0];
        matrix.fold_cumulative(2);

        assert_eq!(matrix.cumulative_long, vec![0.0, 0.0, 1.0, 3.0, 6.0]);
        assert_eq!(matrix.cumulative_short, vec![15.0, 11.0, 6.0, 0.0, 0.0]);

        for i in 3..5 {
            assert!(matrix.cumulative_long[i] >= matrix.cumulative_long[i - 1]);
        }
        for i in (0..2).rev() {
            assert!(matrix.cumulative_short[i] >= matrix.cumulative_short[i + 1]);
        }
    }

    #[test]
    fn all_zero_matrix_still_validates() {
        let mut matrix = LiquidationMatrix::zeroed(3);
        matrix.fold_cumulative(1);
        let record = record_with(matrix, vec![99.0, 100.0, 101.0]);
        assert!(validate_prediction(&record));
    }

    #[test]
    fn empty_levels_or_missing_curves_fail_validation() {
        let mut matrix = LiquidationMatrix::zeroed(3);
        matrix.fold_cumulative(1);
        let record = record_with(matrix, Vec::new());
        assert!(!validate_prediction(&record));

        let unfolded = LiquidationMatrix::zeroed(3);
        let record = record_with(unfolded, vec![99.0, 100.0, 101.0]);
        assert!(!validate_prediction(&record));
    }
}

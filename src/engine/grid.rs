use crate::error::EngineError;

/// Fixed set of evenly spaced price levels around a reference price.
///
/// Levels are rounded to two decimals for display-scale consistency; for very
/// low-priced instruments adjacent levels may collapse to the same rounded
/// value, which is accepted.
#[derive(Debug, Clone)]
pub struct PriceGrid {
    levels: Vec<f64>,
    midpoint: usize,
}

impl PriceGrid {
    /// Build `steps + 1` levels spanning `[price·(1-range), price·(1+range)]`.
    pub fn build(
        current_price: f64,
        range_fraction: f64,
        steps: usize,
    ) -> Result<Self, EngineError> {
        if !current_price.is_finite() || current_price <= 0.0 {
            return Err(EngineError::InvalidRange(format!(
                "current price must be positive, got {current_price}"
            )));
        }
        if steps < 1 {
            return Err(EngineError::InvalidRange("steps must be >= 1".into()));
        }
        if !range_fraction.is_finite() || range_fraction <= 0.0 {
            return Err(EngineError::InvalidRange(format!(
                "range fraction must be positive, got {range_fraction}"
            )));
        }
        let step = (2.0 * range_fraction * current_price) / steps as f64;
        let start = current_price * (1.0 - range_fraction);
        let levels = (0..=steps)
            .map(|i| round2(start + step * i as f64))
            .collect();
        Ok(Self {
            levels,
            midpoint: steps / 2,
        })
    }

    pub fn levels(&self) -> &[f64] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Index of the level anchoring the current price.
    pub fn midpoint(&self) -> usize {
        self.midpoint
    }

    /// Index of the level closest to `price`, clamped to the grid ends.
    pub fn nearest_index(&self, price: f64) -> usize {
        let idx = self.levels.partition_point(|&level| level < price);
        if idx == 0 {
            return 0;
        }
        if idx >= self.levels.len() {
            return self.levels.len() - 1;
        }
        if price - self.levels[idx - 1] <= self.levels[idx] - price {
            idx - 1
        } else {
            idx
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

use serde::Serialize;

use crate::placeholder::PlaceholderCategories;

/// Scale applied to `cumulativeGenerated` by the simulate view.
pub const SIMULATION_MULTIPLIER: f64 = 1.1;

/// Everything the frontend needs to draw one time frame. Published whole and
/// never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSnapshot {
    pub labels: Vec<String>,
    pub supply_change: Vec<f64>,
    pub cumulative_generated: Vec<f64>,
    pub contract_balance_total: f64,
    pub current_eth_total: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<PlaceholderCategories>,
}

impl CacheSnapshot {
    /// A copy with `cumulative_generated` scaled by `multiplier`.
    pub fn simulate(&self, multiplier: f64) -> Self {
        Self {
            cumulative_generated: self
                .cumulative_generated
                .iter()
                .map(|value| value * multiplier)
                .collect(),
            ..self.clone()
        }
    }
}

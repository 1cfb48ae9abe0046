use ethflow_utils::InternalTransaction;
use tracing::warn;

/// `out[i] = values[i + 1] - values[i]`. Empty for fewer than two values.
pub fn deltas(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|pair| pair[1] - pair[0]).collect()
}

/// For each threshold block, the ether sum of transactions mined at or before
/// it. Values that fail to decode count as zero.
pub fn cumulative_at_thresholds(txs: &[InternalTransaction], thresholds: &[u64]) -> Vec<f64> {
    let decoded: Vec<(u64, f64)> = txs
        .iter()
        .map(|tx| (tx.block_number, ether_or_zero(tx)))
        .collect();

    thresholds
        .iter()
        .map(|threshold| {
            decoded
                .iter()
                .filter(|(block, _)| block <= threshold)
                .map(|(_, value)| value)
                .sum()
        })
        .collect()
}

/// Ether sum of every transaction in the list.
pub fn total_ether(txs: &[InternalTransaction]) -> f64 {
    txs.iter().map(ether_or_zero).sum()
}

fn ether_or_zero(tx: &InternalTransaction) -> f64 {
    match tx.ether_value() {
        Ok(value) => value,
        Err(err) => {
            warn!(block = tx.block_number, value = %tx.value, error = %err, "undecodable transaction value");
            0.0
        }
    }
}

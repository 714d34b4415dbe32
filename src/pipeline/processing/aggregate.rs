use std::collections::HashMap;

use tracing::debug;

use crate::types::TransformedListing;

/// Grouping key for the per-neighbourhood average. A missing neighbourhood
/// is its own group, distinct from an empty string.
pub type NeighbourhoodKey = Option<String>;

#[derive(Debug, Default, Clone, Copy)]
struct PriceAccumulator {
    sum: f64,
    count: usize,
}

impl PriceAccumulator {
    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Mean price per neighbourhood over exactly the rows of this batch.
///
/// Keys are compared verbatim; no trimming or case folding happens here.
pub fn neighbourhood_average_prices(rows: &[TransformedListing]) -> HashMap<NeighbourhoodKey, f64> {
    let mut groups: HashMap<NeighbourhoodKey, PriceAccumulator> = HashMap::new();
    for row in rows {
        let acc = groups.entry(row.neighbourhood.clone()).or_default();
        acc.sum += row.price;
        acc.count += 1;
    }

    groups
        .into_iter()
        .map(|(key, acc)| (key, acc.mean()))
        .collect()
}

/// Write each row's neighbourhood mean price into
/// `average_price_neighborhood`. Returns the number of groups.
pub fn annotate_average_prices(rows: &mut [TransformedListing]) -> usize {
    let averages = neighbourhood_average_prices(rows);
    for row in rows.iter_mut() {
        row.average_price_neighborhood = averages.get(&row.neighbourhood).copied().unwrap_or(0.0);
    }
    debug!("Computed average price for {} neighbourhood group(s)", averages.len());
    averages.len()
}

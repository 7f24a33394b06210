use std::collections::HashMap;

use crate::model::{BillingRecord, DistributionBin, DuplicateInfo, SummaryStats};
use crate::normalize::finite_or_zero;

/// Lower edges of the discount histogram, in percent. The last bin runs up
/// to `DISTRIBUTION_CEILING`.
pub const DISTRIBUTION_EDGES: [f64; 8] = [0.0, 5.0, 10.0, 15.0, 20.0, 25.0, 50.0, 100.0];

/// Upper edge of the `>100%` bin. Percentages below 0 or at/above the
/// ceiling land in no bin.
pub const DISTRIBUTION_CEILING: f64 = 1000.0;

/// Summary over a record set. Denominators never drop below 1, so empty
/// input yields zeroed averages.
pub fn compute_stats<'a>(records: impl IntoIterator<Item = &'a BillingRecord>) -> SummaryStats {
    let mut bins = empty_bins();
    let mut total_rows = 0usize;
    let mut total_billed = 0.0;
    let mut total_min = 0.0;
    let mut percent_sum = 0.0;

    // name -> position in `seen`
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut seen: Vec<(&str, usize)> = Vec::new();

    for record in records {
        total_rows += 1;
        total_billed += finite_or_zero(record.billed);
        total_min += finite_or_zero(record.minimum);
        percent_sum += finite_or_zero(record.diff_percent);
        if let Some(bin) = bins.iter_mut().find(|b| b.lower <= record.diff_percent && record.diff_percent < b.upper) {
            bin.count += 1;
        }

        let name = record.student_name.as_str();
        if name.is_empty() {
            continue;
        }
        match index.get(name) {
            Some(&i) => seen[i].1 += 1,
            None => {
                index.insert(name, seen.len());
                seen.push((name, 1));
            }
        }
    }

    let duplicates: Vec<DuplicateInfo> = seen
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(name, count)| DuplicateInfo { name: name.to_string(), count })
        .collect();

    let denom = total_rows.max(1) as f64;

    SummaryStats {
        total_rows,
        duplicate_count: duplicates.len(),
        duplicates,
        avg_diff: (total_billed - total_min) / denom,
        avg_percent: percent_sum / denom,
        total_billed,
        total_min,
        total_discount: total_billed - total_min,
        distribution: bins,
    }
}

fn empty_bins() -> Vec<DistributionBin> {
    DISTRIBUTION_EDGES
        .iter()
        .enumerate()
        .map(|(i, &lower)| {
            let upper = DISTRIBUTION_EDGES.get(i + 1).copied().unwrap_or(DISTRIBUTION_CEILING);
            let range = if i + 1 == DISTRIBUTION_EDGES.len() {
                format!(">{lower}%")
            } else {
                format!("{lower}-{upper}%")
            };
            DistributionBin { range, lower, upper, count: 0 }
        })
        .collect()
}

/// Count of `records` per discount bin, in edge order.
pub fn difference_distribution<'a>(
    records: impl IntoIterator<Item = &'a BillingRecord>,
) -> Vec<DistributionBin> {
    compute_stats(records).distribution
}

/// `None` when there is nothing to summarize.
pub fn summarize<'a>(
    records: impl IntoIterator<Item = &'a BillingRecord>,
) -> Option<SummaryStats> {
    let stats = compute_stats(records);
    (stats.total_rows > 0).then_some(stats)
}

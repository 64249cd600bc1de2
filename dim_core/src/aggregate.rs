//! Per-axis statistical mode over a sample set.

use dim_traits::DimensionEstimate;

/// Most frequent value; on equal counts the value seen first wins.
fn axis_mode(values: impl Iterator<Item = i32>) -> Option<i32> {
    // (value, count) in first-seen order; sample sets are small
    let mut counts: Vec<(i32, usize)> = Vec::new();
    for v in values {
        match counts.iter_mut().find(|(x, _)| *x == v) {
            Some((_, n)) => *n += 1,
            None => counts.push((v, 1)),
        }
    }
    let mut best: Option<(i32, usize)> = None;
    for (v, n) in counts {
        if best.is_none_or(|(_, b)| n > b) {
            best = Some((v, n));
        }
    }
    best.map(|(v, _)| v)
}

/// Combine samples axis by axis. `None` when there is nothing to combine.
pub fn aggregate(samples: &[DimensionEstimate]) -> Option<DimensionEstimate> {
    if samples.is_empty() {
        return None;
    }
    Some(DimensionEstimate {
        length_mm: axis_mode(samples.iter().map(|s| s.length_mm))?,
        width_mm: axis_mode(samples.iter().map(|s| s.width_mm))?,
        height_mm: axis_mode(samples.iter().map(|s| s.height_mm))?,
    })
}

/// Number of microseconds in one second.
pub const MICROS_PER_SEC: u64 = 1_000_000;

/// Frame period in microseconds for a rate in Hz.
/// Clamps `hz` to at least 1 and the result to at least 1 µs.
#[inline]
pub fn period_us(hz: u32) -> u64 {
    (MICROS_PER_SEC / u64::from(hz.max(1))).max(1)
}

/// Median of the strictly positive values, or `None` if there are none.
pub fn positive_median(values: &[i16]) -> Option<i16> {
    let mut v: Vec<i16> = values.iter().copied().filter(|d| *d > 0).collect();
    if v.is_empty() {
        return None;
    }
    let mid = v.len() / 2;
    let (_, m, _) = v.select_nth_unstable(mid);
    Some(*m)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_clamps_zero_rate() {
        assert_eq!(period_us(0), MICROS_PER_SEC);
        assert_eq!(period_us(15), 66_666);
    }

    #[test]
    fn median_ignores_holes() {
        assert_eq!(positive_median(&[0, 0, 1800, 1805, 1810, -1]), Some(1805));
        assert_eq!(positive_median(&[0, 0]), None);
    }
}

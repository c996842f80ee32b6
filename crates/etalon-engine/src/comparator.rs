//! Signature set comparison.

use etalon_core::FeatureSet;

/// Overlap of two feature sets: `(match_count, min_length)`.
///
/// `match_count` counts elements of `a` present in `b`; `min_length` is the
/// size of the smaller set.
pub fn compare(a: &FeatureSet, b: &FeatureSet) -> (usize, usize) {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let matches = small.iter().filter(|w| large.contains(*w)).count();
    (matches, small.len())
}

/// `match_count / min_length`, or 0 when either set is empty.
pub fn ratio(a: &FeatureSet, b: &FeatureSet) -> f64 {
    match compare(a, b) {
        (_, 0) => 0.0,
        (matches, min_len) => (matches as f64 / min_len as f64).min(1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(words: &[&str]) -> FeatureSet {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_compare_counts_overlap_and_min_length() {
        let a = set(&["кошка", "сидеть", "окно"]);
        let b = set(&["кошка", "окно", "собака", "улица"]);
        assert_eq!(compare(&a, &b), (2, 3));
        assert!((ratio(&a, &b) - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_ratio_is_symmetric() {
        let cases = [
            (set(&["а", "б", "в"]), set(&["б", "в", "г", "д"])),
            (set(&["кошка"]), set(&["собака"])),
            (set(&["кошка", "окно"]), set(&["окно"])),
            (set(&[]), set(&["окно"])),
        ];
        for (a, b) in &cases {
            assert_eq!(compare(a, b), compare(b, a));
            assert_eq!(ratio(a, b), ratio(b, a));
        }
    }

    #[test]
    fn test_empty_set_ratio_is_zero() {
        assert_eq!(ratio(&set(&[]), &set(&["кошка"])), 0.0);
        assert_eq!(ratio(&set(&[]), &set(&[])), 0.0);
    }

    #[test]
    fn test_subset_scores_one() {
        let a = set(&["кошка"]);
        let b = set(&["кошка", "окно", "сидеть"]);
        assert_eq!(ratio(&a, &b), 1.0);
    }

    #[test]
    fn test_identical_sets_score_one() {
        let a = set(&["кошка", "окно"]);
        assert_eq!(ratio(&a, &a.clone()), 1.0);
    }
}

//! Similarity aggregation.

use etalon_core::{FragmentKind, Label, LevelRatios, Order};

/// Weighted mean of the level ratios: `(3·r1 + 2·r2 + r3) / 6`.
///
/// Inputs are clamped into `[0, 1]`, so the result is too.
pub fn aggregate(ratios: &LevelRatios) -> f64 {
    let total: f64 = Order::ALL.iter().map(|o| o.weight()).sum();
    let weighted: f64 = Order::ALL
        .iter()
        .map(|o| o.weight() * clamp_unit(ratios.get(*o)))
        .sum();
    clamp_unit(weighted / total)
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Whether a fragment from a text with this label is ground truth.
pub fn classify(label: &Label) -> FragmentKind {
    if label.is_labeled() {
        FragmentKind::Predefined
    } else {
        FragmentKind::Undefined
    }
}

/// Whether a weight is reported under `border` (strictly greater).
pub fn exceeds_border(weight: f64, border: f64) -> bool {
    weight > border
}

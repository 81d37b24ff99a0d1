//! Camera-angle preset tables.
//!
//! Each axis has a small fixed set of allowed values, each paired with the
//! prompt phrase the render model was trained on. Declaration order matters:
//! it is the run order for azimuth views and the tie-break order for snapping.

/// One allowed value on an angle axis and its prompt phrase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preset {
    pub value: f64,
    pub phrase: &'static str,
}

const fn preset(value: f64, phrase: &'static str) -> Preset {
    Preset { value, phrase }
}

/// Azimuth presets in degrees, clockwise from the front.
pub const AZIMUTHS: [Preset; 8] = [
    preset(0.0, "front view"),
    preset(45.0, "front-right quarter view"),
    preset(90.0, "right side view"),
    preset(135.0, "back-right quarter view"),
    preset(180.0, "back view"),
    preset(225.0, "back-left quarter view"),
    preset(270.0, "left side view"),
    preset(315.0, "front-left quarter view"),
];

/// Elevation presets in degrees above the subject's eye line.
pub const ELEVATIONS: [Preset; 4] = [
    preset(-30.0, "low-angle shot"),
    preset(0.0, "eye-level shot"),
    preset(30.0, "elevated shot"),
    preset(60.0, "high-angle shot"),
];

/// Distance presets as a scale relative to the source framing.
pub const DISTANCES: [Preset; 3] = [
    preset(0.6, "close-up"),
    preset(1.0, "medium shot"),
    preset(1.8, "wide shot"),
];

/// Returns the preset closest to `value`.
///
/// Exact ties resolve to the earliest-declared preset. A NaN input compares
/// false against everything and therefore also lands on the first preset.
///
/// # Panics
///
/// Panics if `table` is empty. All tables in this module are non-empty.
pub fn nearest(table: &[Preset], value: f64) -> &Preset {
    &table[nearest_index(table, value)]
}

/// Position of [`nearest`] within `table`.
pub fn nearest_index(table: &[Preset], value: f64) -> usize {
    let mut best = 0;
    let mut best_dist = (table[0].value - value).abs();
    for (index, candidate) in table.iter().enumerate().skip(1) {
        let dist = (candidate.value - value).abs();
        if dist < best_dist {
            best = index;
            best_dist = dist;
        }
    }
    best
}

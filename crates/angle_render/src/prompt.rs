//! Render prompt composition.

use crate::presets::{self, AZIMUTHS, DISTANCES, ELEVATIONS};
use crate::view::AngleView;

/// Builds the render instruction for an arbitrary camera angle.
///
/// Each axis is snapped to its nearest preset before its phrase is looked up,
/// so off-preset slider values still produce one of the trained phrasings.
/// Identical inputs always produce identical prompts.
pub fn build_prompt(azimuth: f64, elevation: f64, distance: f64, suffix: &str) -> String {
    let az = presets::nearest(&AZIMUTHS, azimuth).phrase;
    let el = presets::nearest(&ELEVATIONS, elevation).phrase;
    let dist = presets::nearest(&DISTANCES, distance).phrase;

    let mut prompt = format!(
        "<sks> {az}, {el}, {dist}. Re-render the same subject from this camera angle, \
         keeping identity, outfit, lighting and background consistent."
    );
    let suffix = suffix.trim();
    if !suffix.is_empty() {
        prompt.push(' ');
        prompt.push_str(suffix);
    }
    prompt
}

/// Prompt for a view that is already on presets.
pub fn view_prompt(view: &AngleView, suffix: &str) -> String {
    build_prompt(view.azimuth, view.elevation, view.distance, suffix)
}

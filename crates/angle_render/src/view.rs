use crate::presets::{self, AZIMUTHS, DISTANCES, ELEVATIONS};
use serde::Serialize;

/// One requested shot within a run. Every field holds a preset value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AngleView {
    pub azimuth: f64,
    pub elevation: f64,
    pub distance: f64,
}

impl AngleView {
    /// Snaps each axis to its nearest preset.
    pub fn snapped(azimuth: f64, elevation: f64, distance: f64) -> Self {
        Self {
            azimuth: presets::nearest(&AZIMUTHS, azimuth).value,
            elevation: presets::nearest(&ELEVATIONS, elevation).value,
            distance: presets::nearest(&DISTANCES, distance).value,
        }
    }

    /// The views of a run: every azimuth preset, in declaration order, at the
    /// current elevation and distance.
    pub fn orbit(elevation: f64, distance: f64) -> Vec<Self> {
        let elevation = presets::nearest(&ELEVATIONS, elevation).value;
        let distance = presets::nearest(&DISTANCES, distance).value;
        AZIMUTHS
            .iter()
            .map(|az| Self {
                azimuth: az.value,
                elevation,
                distance,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orbit_covers_every_azimuth_in_order() {
        let views = AngleView::orbit(12.0, 2.5);
        assert_eq!(views.len(), AZIMUTHS.len());
        for (view, preset) in views.iter().zip(AZIMUTHS.iter()) {
            assert_eq!(view.azimuth, preset.value);
            assert_eq!(view.elevation, 0.0);
            assert_eq!(view.distance, 1.8);
        }
    }

    #[test]
    fn snapped_is_idempotent() {
        let once = AngleView::snapped(200.0, 47.0, 0.7);
        let twice = AngleView::snapped(once.azimuth, once.elevation, once.distance);
        assert_eq!(once, twice);
    }
}

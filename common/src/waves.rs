use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::parameters::{deserialize_positions, serialize_positions};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum WaveParameters {
    /// A unit amplitude, zero phase plane wave
    PlaneWave,

    /// A focused probe, one per position. With neither `positions` nor `scan`
    /// a single probe is placed at the centre of the grid.
    Probe {
        /// Aperture semiangle [mrad]. No aperture if absent.
        semiangle_cutoff: Option<f64>,
        /// Softening of the aperture edge as a fraction of the cutoff
        #[serde(default)]
        rolloff: f64,
        /// Defocus spread [Å]
        #[serde(default)]
        focal_spread: f64,
        /// Beam convergence spread [mrad]
        #[serde(default)]
        angular_spread: f64,
        /// Defocus [Å] (positive is underfocus, C10 = -defocus)
        #[serde(default)]
        defocus: f64,
        /// Probe positions [Å], e.g. "(0, 0), (2.5, 2.5)"
        #[serde(
            default,
            deserialize_with = "deserialize_positions",
            serialize_with = "serialize_positions",
            skip_serializing_if = "Option::is_none"
        )]
        positions: Option<Vec<[f64; 2]>>,
        /// Any other polar aberration coefficients by symbol or alias, e.g. `Cs`
        #[serde(default)]
        aberrations: BTreeMap<String, f64>,
        /// A regular raster of probe positions (used if `positions` is absent)
        scan: Option<ScanParameters>,
    },
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct ScanParameters {
    /// Corner of the raster [Å]
    pub start: [f64; 2],
    /// Opposite corner of the raster (excluded) [Å]
    pub end: [f64; 2],
    /// Number of positions along each axis
    pub gpts: [usize; 2],
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct DetectorParameters {
    /// Inner detection angle [mrad]
    pub inner: f64,
    /// Outer detection angle [mrad]
    pub outer: f64,
    /// Width of the cosine taper on both edges [mrad]
    #[serde(default)]
    pub rolloff: f64,
}

use mslice_common::DetectorParameters;
use ndarray::{Array2, ArrayD, Axis, Data};
use num::complex::Complex64;
use std::f64::consts::PI;

use crate::{
    energy::Energy,
    transfer::scattering_angles,
    utils::{error::WaveError, fft::fft2, grid::Grid},
    waves::WaveField,
};

/// Annular detector integrating the diffracted intensity between an inner and an
/// outer scattering angle. Angles are in mrad.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnnularDetector {
    inner: f64,
    outer: f64,
    rolloff: f64,
}

impl AnnularDetector {
    pub fn new(inner: f64, outer: f64) -> Result<AnnularDetector, WaveError> {
        if !(inner.is_finite() && inner >= 0.0) {
            return Err(WaveError::invalid("detector inner angle", inner));
        }
        if outer.is_nan() || outer <= inner {
            return Err(WaveError::invalid("detector outer angle", outer));
        }
        Ok(AnnularDetector {
            inner,
            outer,
            rolloff: 0.0,
        })
    }

    /// Softens both edges with a cosine taper of width `rolloff` [mrad]
    pub fn with_rolloff(mut self, rolloff: f64) -> Result<AnnularDetector, WaveError> {
        if !(rolloff.is_finite() && rolloff >= 0.0) {
            return Err(WaveError::invalid("detector rolloff", rolloff));
        }
        self.rolloff = rolloff;
        Ok(self)
    }

    pub fn from_parameters(parameters: &DetectorParameters) -> Result<AnnularDetector, WaveError> {
        AnnularDetector::new(parameters.inner, parameters.outer)?.with_rolloff(parameters.rolloff)
    }

    pub fn inner(&self) -> f64 {
        self.inner
    }

    pub fn outer(&self) -> f64 {
        self.outer
    }

    /// Fraction of the intensity at scattering angle `alpha` [rad] that is counted
    pub fn efficiency_at(&self, alpha: f64) -> f64 {
        let inner = self.inner * 1e-3;
        let outer = self.outer * 1e-3;

        if self.rolloff > 0.0 {
            let rolloff = self.rolloff * 1e-3;

            let outer_edge = if alpha <= outer {
                1.0
            } else if alpha < outer + rolloff {
                0.5 * (1.0 + (PI * (alpha - outer) / rolloff).cos())
            } else {
                0.0
            };

            let inner_edge = if alpha >= inner {
                1.0
            } else if alpha > inner - rolloff {
                0.5 * (1.0 + (PI * (inner - alpha) / rolloff).cos())
            } else {
                0.0
            };

            outer_edge * inner_edge
        } else if alpha >= inner && alpha <= outer {
            1.0
        } else {
            0.0
        }
    }

    /// Detector efficiency on the reciprocal space of `grid`, in FFT order
    pub fn efficiency(&self, grid: &Grid, energy: Energy) -> Array2<f64> {
        let (alpha, _) = scattering_angles(grid, energy);
        alpha.mapv(|alpha| self.efficiency_at(alpha))
    }

    /// Fraction of the total intensity of every wave function in the batch that
    /// falls on the detector. The result has the batch shape of `waves`.
    pub fn detect<S>(&self, waves: &WaveField<S>) -> ArrayD<f64>
    where
        S: Data<Elem = Complex64>,
    {
        let efficiency = self.efficiency(waves.grid(), waves.energy());
        let intensity = fft2(waves.array()).mapv(|z| z.norm_sqr());

        let ndim = intensity.ndim();
        let detected = (&intensity * &efficiency)
            .sum_axis(Axis(ndim - 1))
            .sum_axis(Axis(ndim - 2));
        let total = intensity.sum_axis(Axis(ndim - 1)).sum_axis(Axis(ndim - 2));

        ndarray::Zip::from(&detected)
            .and(&total)
            .map_collect(|&detected, &total| if total > 0.0 { detected / total } else { 0.0 })
    }
}

#[test]
fn test_efficiency_hard_edges() {
    let detector = AnnularDetector::new(50.0, 150.0).unwrap();
    assert_eq!(detector.efficiency_at(0.0), 0.0);
    assert_eq!(detector.efficiency_at(0.049), 0.0);
    assert_eq!(detector.efficiency_at(0.1), 1.0);
    assert_eq!(detector.efficiency_at(0.151), 0.0);
}

#[test]
fn test_efficiency_rolloff() {
    use approx::assert_abs_diff_eq;

    let detector = AnnularDetector::new(50.0, 150.0)
        .unwrap()
        .with_rolloff(10.0)
        .unwrap();
    assert_eq!(detector.efficiency_at(0.1), 1.0);
    assert_abs_diff_eq!(detector.efficiency_at(0.155), 0.5, epsilon = 1e-12);
    assert_abs_diff_eq!(detector.efficiency_at(0.045), 0.5, epsilon = 1e-12);
    assert_eq!(detector.efficiency_at(0.161), 0.0);
    assert_eq!(detector.efficiency_at(0.039), 0.0);
}

#[test]
fn test_rejects_bad_angles() {
    assert!(AnnularDetector::new(-1.0, 10.0).is_err());
    assert!(AnnularDetector::new(20.0, 10.0).is_err());
    assert!(AnnularDetector::new(0.0, 10.0)
        .unwrap()
        .with_rolloff(-1.0)
        .is_err());
}

#[test]
fn test_plane_wave_only_hits_the_bright_field() {
    use crate::builders::{PlaneWave, WaveBuilder};

    let grid = Grid::new(10.0, 64usize).unwrap();
    let waves = PlaneWave::new(grid, Energy::new(300e3).unwrap())
        .build()
        .unwrap();

    let bright_field = AnnularDetector::new(0.0, 10.0).unwrap().detect(&waves);
    let dark_field = AnnularDetector::new(50.0, 150.0).unwrap().detect(&waves);

    assert_eq!(bright_field.ndim(), 0);
    assert!((bright_field.sum() - 1.0).abs() < 1e-12);
    assert!(dark_field.sum() < 1e-12);
}

#[test]
fn test_detect_keeps_batch_shape() {
    use crate::builders::Probe;

    let grid = Grid::new(8.0, 64usize).unwrap();
    let waves = Probe::new(grid, Energy::new(200e3).unwrap())
        .semiangle_cutoff(20.0)
        .build_at(&[[2.0, 2.0], [4.0, 4.0], [6.0, 6.0]])
        .unwrap();

    let detected = AnnularDetector::new(0.0, 30.0).unwrap().detect(&waves);
    assert_eq!(detected.shape(), &[3]);
    for &value in detected.iter() {
        assert!((value - 1.0).abs() < 1e-10);
    }
}

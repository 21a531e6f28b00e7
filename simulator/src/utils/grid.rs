use mslice_common::PerAxis;
use ndarray::{ArrayBase, Data, DataMut, Dimension};
use num::complex::Complex64;
use serde::Serialize;

use super::{error::WaveError, fft::fftfreq};

/// Lateral simulation grid: physical extent [Å] and number of grid points
/// along x and y. The sampling is always derived as `extent / gpts`, so the
/// three quantities cannot drift apart.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Grid {
    extent: [f64; 2],
    gpts: [usize; 2],
}

impl Grid {
    pub fn new(
        extent: impl Into<PerAxis<f64>>,
        gpts: impl Into<PerAxis<usize>>,
    ) -> Result<Grid, WaveError> {
        let extent = check_lengths("extent", extent.into().to_array())?;
        let gpts = check_gpts(gpts.into().to_array())?;
        Ok(Grid { extent, gpts })
    }

    /// Grid covering `extent` with at most `sampling` between points. The number of
    /// points is rounded up, and the sampling is then re-derived from it.
    pub fn from_sampling(
        extent: impl Into<PerAxis<f64>>,
        sampling: impl Into<PerAxis<f64>>,
    ) -> Result<Grid, WaveError> {
        let extent = check_lengths("extent", extent.into().to_array())?;
        let sampling = check_lengths("sampling", sampling.into().to_array())?;

        // Tolerate round off in extent / sampling before rounding up
        let gpts = [0, 1].map(|i| ((extent[i] / sampling[i]) - 1e-9).ceil().max(1.0) as usize);
        Grid::new(extent, gpts)
    }

    pub fn from_gpts_and_sampling(
        gpts: impl Into<PerAxis<usize>>,
        sampling: impl Into<PerAxis<f64>>,
    ) -> Result<Grid, WaveError> {
        let gpts = check_gpts(gpts.into().to_array())?;
        let sampling = check_lengths("sampling", sampling.into().to_array())?;
        Grid::new([0, 1].map(|i| gpts[i] as f64 * sampling[i]), gpts)
    }

    /// Builds a grid from any two of extent, gpts and sampling. If all three are given,
    /// extent and gpts win.
    pub fn resolve(
        extent: Option<PerAxis<f64>>,
        gpts: Option<PerAxis<usize>>,
        sampling: Option<PerAxis<f64>>,
    ) -> Result<Grid, WaveError> {
        match (extent, gpts, sampling) {
            (Some(extent), Some(gpts), sampling) => {
                if sampling.is_some() {
                    log::debug!("extent and gpts given, ignoring sampling");
                }
                Grid::new(extent, gpts)
            }
            (Some(extent), None, Some(sampling)) => Grid::from_sampling(extent, sampling),
            (None, Some(gpts), Some(sampling)) => Grid::from_gpts_and_sampling(gpts, sampling),
            _ => Err(WaveError::InvalidParameter {
                name: "grid",
                value: "two of extent, gpts and sampling are required".to_string(),
            }),
        }
    }

    /// Physical size [Å]
    pub fn extent(&self) -> [f64; 2] {
        self.extent
    }

    /// Number of grid points
    pub fn gpts(&self) -> [usize; 2] {
        self.gpts
    }

    /// Distance between grid points [Å]
    pub fn sampling(&self) -> [f64; 2] {
        [0, 1].map(|i| self.extent[i] / self.gpts[i] as f64)
    }

    /// Distance between spatial frequencies [1 / Å]
    pub fn reciprocal_sampling(&self) -> [f64; 2] {
        self.extent.map(f64::recip)
    }

    /// Spatial frequencies along x and y in FFT order [1 / Å]
    pub fn spatial_frequencies(&self) -> [Vec<f64>; 2] {
        let sampling = self.sampling();
        [0, 1].map(|i| fftfreq(self.gpts[i], sampling[i]))
    }

    /// Real space coordinates of the grid points along x and y [Å]
    pub fn coordinates(&self) -> [Vec<f64>; 2] {
        let sampling = self.sampling();
        [0, 1].map(|i| (0..self.gpts[i]).map(|j| j as f64 * sampling[i]).collect())
    }

    /// Checks the two trailing axes of `shape` against `gpts`.
    pub fn check_shape(&self, shape: &[usize]) -> Result<(), WaveError> {
        if shape.len() < 2 || shape[shape.len() - 2..] != self.gpts {
            return Err(WaveError::ShapeMismatch {
                expected: self.gpts.to_vec(),
                found: shape.to_vec(),
            });
        }
        Ok(())
    }
}

fn check_lengths(name: &'static str, values: [f64; 2]) -> Result<[f64; 2], WaveError> {
    if values.iter().all(|v| v.is_finite() && *v > 0.0) {
        Ok(values)
    } else {
        Err(WaveError::invalid(name, values))
    }
}

fn check_gpts(gpts: [usize; 2]) -> Result<[usize; 2], WaveError> {
    if gpts.iter().all(|&n| n > 0) {
        Ok(gpts)
    } else {
        Err(WaveError::invalid("gpts", gpts))
    }
}

/// Rescales `array` so that the sum of `|ψ|²` is 1. Arrays with zero norm are left as is.
pub fn normalize<S, D>(array: &mut ArrayBase<S, D>)
where
    S: DataMut<Elem = Complex64>,
    D: Dimension,
{
    let norm: f64 = array.iter().map(|z| z.norm_sqr()).sum();
    if norm > 0.0 {
        let scale = norm.sqrt().recip();
        array.mapv_inplace(|z| z * scale);
    }
}

pub fn check_norm<S, D>(array: &ArrayBase<S, D>) -> bool
where
    S: Data<Elem = Complex64>,
    D: Dimension,
{
    let norm: f64 = array.iter().map(|z| z.norm_sqr()).sum();
    (norm - 1.0).abs() < 1e-6
}

pub fn check_complex_for_nans<S, D>(array: &ArrayBase<S, D>) -> bool
where
    S: Data<Elem = Complex64>,
    D: Dimension,
{
    // true if no NaN or Inf is present
    array.iter().all(|z| z.re.is_finite() && z.im.is_finite())
}

#[test]
fn test_sampling_is_extent_over_gpts() {
    use approx::assert_abs_diff_eq;

    for &(extent, gpts) in &[(10.0, 512usize), (3.7, 17), (123.4, 1000), (0.5, 1)] {
        let grid = Grid::new(extent, gpts).unwrap();
        let sampling = grid.sampling();
        assert_eq!(sampling, [extent / gpts as f64; 2]);
        assert_abs_diff_eq!(sampling[0] * gpts as f64, extent, epsilon = 1e-12);
    }

    let grid = Grid::new(10.0, 512usize).unwrap();
    assert_eq!(grid.sampling(), [0.01953125, 0.01953125]);
}

#[test]
fn test_from_sampling_rounds_gpts_up() {
    use approx::assert_abs_diff_eq;

    let grid = Grid::from_sampling([10.0, 8.0], 0.05).unwrap();
    assert_eq!(grid.gpts(), [200, 160]);

    let grid = Grid::from_sampling(10.0, 0.3).unwrap();
    assert_eq!(grid.gpts(), [34, 34]);
    assert_abs_diff_eq!(grid.sampling()[0], 10.0 / 34.0, epsilon = 1e-12);
    assert_eq!(grid.extent(), [10.0, 10.0]);
}

#[test]
fn test_from_gpts_and_sampling() {
    let grid = Grid::from_gpts_and_sampling([100usize, 50], 0.25).unwrap();
    assert_eq!(grid.extent(), [25.0, 12.5]);
}

#[test]
fn test_resolve_needs_two_quantities() {
    let grid = Grid::resolve(Some(PerAxis::Uniform(10.0)), None, Some(PerAxis::Uniform(0.1)));
    assert_eq!(grid.unwrap().gpts(), [100, 100]);

    let grid = Grid::resolve(None, Some(PerAxis::Axes([32, 64])), None);
    assert!(matches!(grid, Err(WaveError::InvalidParameter { .. })));
}

#[test]
fn test_rejects_non_positive() {
    assert!(matches!(
        Grid::new(0.0, 10usize),
        Err(WaveError::InvalidParameter { name: "extent", .. })
    ));
    assert!(matches!(
        Grid::new([10.0, -1.0], 10usize),
        Err(WaveError::InvalidParameter { .. })
    ));
    assert!(matches!(
        Grid::new(10.0, [10usize, 0]),
        Err(WaveError::InvalidParameter { name: "gpts", .. })
    ));
    assert!(matches!(
        Grid::from_sampling(10.0, f64::NAN),
        Err(WaveError::InvalidParameter { name: "sampling", .. })
    ));
}

#[test]
fn test_reciprocal_space_and_coordinates() {
    let grid = Grid::new([4.0, 2.0], [8usize, 4]).unwrap();
    assert_eq!(grid.reciprocal_sampling(), [0.25, 0.5]);

    let [kx, ky] = grid.spatial_frequencies();
    assert_eq!(kx, vec![0.0, 0.25, 0.5, 0.75, -1.0, -0.75, -0.5, -0.25]);
    assert_eq!(ky, vec![0.0, 0.5, -1.0, -0.5]);

    let [x, y] = grid.coordinates();
    assert_eq!(x, vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5]);
    assert_eq!(y, vec![0.0, 0.5, 1.0, 1.5]);
}

#[test]
fn test_check_shape() {
    let grid = Grid::new(10.0, [4usize, 6]).unwrap();
    assert!(grid.check_shape(&[4, 6]).is_ok());
    assert!(grid.check_shape(&[3, 2, 4, 6]).is_ok());
    assert!(matches!(
        grid.check_shape(&[6, 4]),
        Err(WaveError::ShapeMismatch { .. })
    ));
    assert!(grid.check_shape(&[6]).is_err());
}

#[test]
fn test_normalize() {
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;

    let mut array = Array2::from_elem((8, 8), Complex64::new(1.0, 1.0));
    normalize(&mut array);

    assert_abs_diff_eq!(
        array.iter().map(|z| z.norm_sqr()).sum::<f64>(),
        1.0,
        epsilon = 1e-12
    );
    assert!(check_norm(&array));
    assert!(check_complex_for_nans(&array));

    array[[3, 3]] = Complex64::new(f64::NAN, 0.0);
    assert!(!check_complex_for_nans(&array));
}

//! The wave function container.
//!
//! A [`WaveField`] couples a complex array with the lateral [`Grid`] and beam
//! [`Energy`] it is defined on. The two trailing array axes are spatial (x, y);
//! any leading axes index a batch of independent wave functions on the same grid.
//!
//! `WaveField` is generic over ndarray storage, in the same way `ArrayBase` is:
//! [`Waves`] owns its buffer, while [`WavesView`] and [`WavesViewMut`] borrow the
//! buffer of a parent field. Indexing the batch never copies; writes through a
//! mutable view land in the parent's buffer.

use mslice_common::{constants::ANTIALIAS_FRACTION, PerAxis};
use ndarray::{
    Array, Array2, ArrayBase, ArrayD, ArrayViewMut2, ArrayViewMutD, Axis, Data, DataMut,
    Dimension, Ix2, IxDyn, OwnedRepr, RawData, RawDataClone, ViewRepr,
};
use num::complex::Complex64;
use std::fmt;

use crate::{
    energy::Energy,
    utils::{
        error::WaveError,
        fft::{fft2, fftshift2},
        grid::{check_complex_for_nans, normalize, Grid},
    },
};

pub struct WaveField<S>
where
    S: RawData<Elem = Complex64>,
{
    array: ArrayBase<S, IxDyn>,
    grid: Grid,
    energy: Energy,
}

/// Waves owning their buffer
pub type Waves = WaveField<OwnedRepr<Complex64>>;

/// Waves borrowing the buffer of another field
pub type WavesView<'a> = WaveField<ViewRepr<&'a Complex64>>;

/// Waves mutably borrowing the buffer of another field
pub type WavesViewMut<'a> = WaveField<ViewRepr<&'a mut Complex64>>;

impl Waves {
    /// Waves from an existing array with the given lateral extent [Å] and energy [eV].
    /// The number of grid points is taken from the two trailing axes of `array`.
    pub fn new<D: Dimension>(
        array: Array<Complex64, D>,
        extent: impl Into<PerAxis<f64>>,
        energy: f64,
    ) -> Result<Waves, WaveError> {
        let array = array.into_dyn();
        let grid = Grid::new(extent, spatial_shape(array.shape())?)?;
        Waves::with_grid(array, grid, Energy::new(energy)?)
    }

    /// Waves from an existing array with the given sampling [Å]; the extent is
    /// `sampling * gpts`.
    pub fn with_sampling<D: Dimension>(
        array: Array<Complex64, D>,
        sampling: impl Into<PerAxis<f64>>,
        energy: f64,
    ) -> Result<Waves, WaveError> {
        let array = array.into_dyn();
        let grid = Grid::from_gpts_and_sampling(spatial_shape(array.shape())?, sampling)?;
        Waves::with_grid(array, grid, Energy::new(energy)?)
    }

    /// Waves from an existing array on a known grid. Fails if the trailing axes of
    /// `array` differ from `grid.gpts()`.
    pub fn with_grid<D: Dimension>(
        array: Array<Complex64, D>,
        grid: Grid,
        energy: Energy,
    ) -> Result<Waves, WaveError> {
        grid.check_shape(array.shape())?;
        Ok(WaveField {
            array: array.into_dyn(),
            grid,
            energy,
        })
    }

    /// Hands back the buffer
    pub fn into_array(self) -> ArrayD<Complex64> {
        self.array
    }
}

fn spatial_shape(shape: &[usize]) -> Result<[usize; 2], WaveError> {
    match shape {
        [.., nx, ny] if *nx > 0 && *ny > 0 => Ok([*nx, *ny]),
        _ => Err(WaveError::ShapeMismatch {
            expected: vec![1, 1],
            found: shape.to_vec(),
        }),
    }
}

impl<S> WaveField<S>
where
    S: Data<Elem = Complex64>,
{
    pub fn array(&self) -> &ArrayBase<S, IxDyn> {
        &self.array
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Lateral extent [Å]
    pub fn extent(&self) -> [f64; 2] {
        self.grid.extent()
    }

    /// Number of grid points along x and y
    pub fn gpts(&self) -> [usize; 2] {
        self.grid.gpts()
    }

    /// Real space sampling [Å]
    pub fn sampling(&self) -> [f64; 2] {
        self.grid.sampling()
    }

    /// Beam energy [eV]
    pub fn energy(&self) -> Energy {
        self.energy
    }

    /// Relativistic wavelength [Å]
    pub fn wavelength(&self) -> f64 {
        self.energy.wavelength()
    }

    /// Largest scattering angle along x and y that is free of aliasing [mrad]:
    /// two thirds of the Nyquist angle `wavelength / (2 sampling)`.
    pub fn cutoff_scattering_angles(&self) -> [f64; 2] {
        let wavelength = self.wavelength();
        self.sampling()
            .map(|sampling| ANTIALIAS_FRACTION * wavelength / (2.0 * sampling) * 1e3)
    }

    /// Shape of the leading (batch) axes, empty for a single wave function
    pub fn batch_shape(&self) -> &[usize] {
        let shape = self.array.shape();
        &shape[..shape.len() - 2]
    }

    pub fn view(&self) -> WavesView<'_> {
        WaveField {
            array: self.array.view(),
            grid: self.grid,
            energy: self.energy,
        }
    }

    /// The wave functions at `index` along the first batch axis.
    pub fn get(&self, index: usize) -> Result<WavesView<'_>, WaveError> {
        self.check_batch_index(index)?;
        Ok(WaveField {
            array: self.array.index_axis(Axis(0), index),
            grid: self.grid,
            energy: self.energy,
        })
    }

    /// Iterates over the first batch axis. A field without batch axes yields itself.
    pub fn iter_batch(&self) -> impl Iterator<Item = WavesView<'_>> + '_ {
        let len = match self.batch_shape().first() {
            Some(&len) => len,
            None => 1,
        };
        (0..len).map(move |index| match self.get(index) {
            Ok(view) => view,
            Err(_) => self.view(),
        })
    }

    /// Explicit copy into a new owned buffer
    pub fn to_owned(&self) -> Waves {
        WaveField {
            array: self.array.to_owned(),
            grid: self.grid,
            energy: self.energy,
        }
    }

    /// `|ψ|²`, same shape as the array
    pub fn intensity(&self) -> ArrayD<f64> {
        self.array.map(|z| z.norm_sqr())
    }

    /// `|FFT ψ|²` over the spatial axes, with the zero frequency at the centre
    pub fn diffraction_pattern(&self) -> ArrayD<f64> {
        fftshift2(&fft2(&self.array).map(|z| z.norm_sqr()))
    }

    /// Intensity summed over all batch axes together with the
    /// `[x_min, x_max, y_min, y_max]` extent of the image [Å].
    pub fn image(&self) -> Result<(Array2<f64>, [f64; 4]), WaveError> {
        let mut intensity = self.intensity();
        while intensity.ndim() > 2 {
            intensity = intensity.sum_axis(Axis(0));
        }
        let image = intensity
            .into_dimensionality::<Ix2>()
            .map_err(|_| WaveError::ShapeMismatch {
                expected: self.gpts().to_vec(),
                found: self.array.shape().to_vec(),
            })?;
        let [x, y] = self.extent();
        Ok((image, [0.0, x, 0.0, y]))
    }

    /// true if no NaN or Inf is present
    pub fn is_finite(&self) -> bool {
        check_complex_for_nans(&self.array)
    }

    fn check_batch_index(&self, index: usize) -> Result<(), WaveError> {
        match self.batch_shape().first() {
            None => Err(WaveError::NoBatchAxis),
            Some(&len) if index >= len => Err(WaveError::IndexOutOfBounds { index, len }),
            Some(_) => Ok(()),
        }
    }
}

impl<S> WaveField<S>
where
    S: DataMut<Elem = Complex64>,
{
    /// Mutable view of the buffer. The shape cannot be changed through it.
    pub fn array_mut(&mut self) -> ArrayViewMutD<'_, Complex64> {
        self.array.view_mut()
    }

    pub fn view_mut(&mut self) -> WavesViewMut<'_> {
        WaveField {
            array: self.array.view_mut(),
            grid: self.grid,
            energy: self.energy,
        }
    }

    /// Mutable view of the wave functions at `index` along the first batch axis.
    pub fn get_mut(&mut self, index: usize) -> Result<WavesViewMut<'_>, WaveError> {
        self.check_batch_index(index)?;
        Ok(WaveField {
            array: self.array.index_axis_mut(Axis(0), index),
            grid: self.grid,
            energy: self.energy,
        })
    }

    /// Rescales every wave function in the batch so that the sum of `|ψ|²` over its
    /// grid is 1.
    pub fn normalize(&mut self) {
        for_each_image_mut(self.array.view_mut(), &mut |mut image| normalize(&mut image));
    }
}

/// Calls `f` on every 2D spatial image of `array`
pub(crate) fn for_each_image_mut<F>(mut array: ArrayViewMutD<'_, Complex64>, f: &mut F)
where
    F: FnMut(ArrayViewMut2<'_, Complex64>),
{
    if array.ndim() > 2 {
        for sub_array in array.outer_iter_mut() {
            for_each_image_mut(sub_array, f);
        }
    } else if let Ok(image) = array.into_dimensionality::<Ix2>() {
        f(image)
    }
}

impl<S> Clone for WaveField<S>
where
    S: RawDataClone<Elem = Complex64>,
{
    fn clone(&self) -> Self {
        WaveField {
            array: self.array.clone(),
            grid: self.grid,
            energy: self.energy,
        }
    }
}

impl<S> fmt::Debug for WaveField<S>
where
    S: Data<Elem = Complex64>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaveField")
            .field("shape", &self.array.shape())
            .field("extent", &self.extent())
            .field("sampling", &self.sampling())
            .field("energy", &self.energy.value())
            .finish()
    }
}

#[test]
fn test_sampling_from_extent() {
    let waves = Waves::new(Array2::<Complex64>::zeros((512, 512)), 10.0, 300e3).unwrap();

    assert_eq!(waves.gpts(), [512, 512]);
    assert_eq!(waves.extent(), [10.0, 10.0]);
    assert_eq!(waves.sampling(), [0.01953125, 0.01953125]);
    assert!(waves.batch_shape().is_empty());
}

#[test]
fn test_extent_from_sampling() {
    use ndarray::Array3;

    let waves =
        Waves::with_sampling(Array3::<Complex64>::zeros((2, 100, 50)), [0.1, 0.2], 300e3).unwrap();

    assert_eq!(waves.gpts(), [100, 50]);
    assert_eq!(waves.extent(), [10.0, 10.0]);
    assert_eq!(waves.batch_shape(), &[2]);
}

#[test]
fn test_array_is_not_copied() {
    let array = Array2::<Complex64>::zeros((64, 32));
    let pointer = array.as_ptr();

    let waves = Waves::new(array, [6.4, 3.2], 200e3).unwrap();
    assert_eq!(waves.array().as_ptr(), pointer);
    assert_eq!(waves.view().array().as_ptr(), pointer);
    assert_eq!(waves.into_array().as_ptr(), pointer);
}

#[test]
fn test_shape_mismatch() {
    use ndarray::Array1;

    let grid = Grid::new(10.0, [64usize, 64]).unwrap();
    let energy = Energy::new(300e3).unwrap();

    let result = Waves::with_grid(Array2::<Complex64>::zeros((64, 32)), grid, energy);
    assert!(matches!(result, Err(WaveError::ShapeMismatch { .. })));

    let result = Waves::new(Array1::<Complex64>::zeros(64), 10.0, 300e3);
    assert!(matches!(result, Err(WaveError::ShapeMismatch { .. })));

    let result = Waves::new(Array2::<Complex64>::zeros((0, 64)), 10.0, 300e3);
    assert!(matches!(result, Err(WaveError::ShapeMismatch { .. })));
}

#[test]
fn test_invalid_parameters() {
    let result = Waves::new(Array2::<Complex64>::zeros((8, 8)), -1.0, 300e3);
    assert!(matches!(
        result,
        Err(WaveError::InvalidParameter { name: "extent", .. })
    ));

    let result = Waves::new(Array2::<Complex64>::zeros((8, 8)), 1.0, 0.0);
    assert!(matches!(
        result,
        Err(WaveError::InvalidParameter { name: "energy", .. })
    ));
}

#[test]
fn test_cutoff_scattering_angles() {
    use approx::assert_abs_diff_eq;

    let coarse = Waves::new(Array2::<Complex64>::zeros((256, 128)), 10.0, 300e3).unwrap();
    let fine = Waves::new(Array2::<Complex64>::zeros((512, 256)), 10.0, 300e3).unwrap();

    let [coarse_x, coarse_y] = coarse.cutoff_scattering_angles();
    let [fine_x, fine_y] = fine.cutoff_scattering_angles();

    // 2/3 * λ / (2 dx) in mrad
    let expected = 2.0 / 3.0 * coarse.wavelength() / (2.0 * 10.0 / 256.0) * 1e3;
    assert_abs_diff_eq!(coarse_x, expected, epsilon = 1e-9);

    // Halving the sampling doubles the cutoff
    assert_abs_diff_eq!(fine_x, 2.0 * coarse_x, epsilon = 1e-9);
    assert_abs_diff_eq!(fine_y, 2.0 * coarse_y, epsilon = 1e-9);
    assert_abs_diff_eq!(coarse_x, 2.0 * coarse_y, epsilon = 1e-9);
}

#[test]
fn test_batch_indexing() {
    use ndarray::Array4;

    let array = Array4::from_shape_fn((3, 2, 8, 4), |(a, b, _, _)| {
        Complex64::new(a as f64, b as f64)
    });
    let waves = Waves::new(array, 1.0, 100e3).unwrap();

    let second = waves.get(1).unwrap();
    assert_eq!(second.array().shape(), &[2, 8, 4]);
    assert_eq!(second.gpts(), waves.gpts());
    assert_eq!(second.extent(), waves.extent());
    assert_eq!(second.array()[[1, 0, 0]], Complex64::new(1.0, 1.0));

    let innermost = second.get(1).unwrap();
    assert_eq!(innermost.array().shape(), &[8, 4]);
    assert!(matches!(innermost.get(0), Err(WaveError::NoBatchAxis)));

    assert!(matches!(
        waves.get(3),
        Err(WaveError::IndexOutOfBounds { index: 3, len: 3 })
    ));
    assert_eq!(waves.iter_batch().count(), 3);
    assert_eq!(innermost.iter_batch().count(), 1);
}

#[test]
fn test_views_alias_parent_buffer() {
    use ndarray::Array3;

    let mut waves = Waves::new(Array3::<Complex64>::zeros((3, 4, 4)), 1.0, 100e3).unwrap();
    let pointer = waves.array().as_ptr();

    // Views point into the parent buffer
    let offset = 4 * 4;
    assert_eq!(waves.get(1).unwrap().array().as_ptr(), pointer.wrapping_add(offset));

    // Writes through a mutable view are visible in the parent
    {
        let mut second = waves.get_mut(1).unwrap();
        second.array_mut().fill(Complex64::new(2.0, -1.0));
    }
    assert_eq!(waves.array()[[1, 2, 3]], Complex64::new(2.0, -1.0));
    assert_eq!(waves.array()[[0, 2, 3]], Complex64::new(0.0, 0.0));

    // Explicit copies do not alias
    let mut copy = waves.get(1).unwrap().to_owned();
    copy.array_mut().fill(Complex64::new(0.0, 0.0));
    assert_eq!(waves.array()[[1, 0, 0]], Complex64::new(2.0, -1.0));
}

#[test]
fn test_normalize_each_image() {
    use approx::assert_abs_diff_eq;
    use ndarray::Array4;

    let array = Array4::from_shape_fn((2, 3, 4, 4), |(a, b, i, j)| {
        Complex64::new((1 + a + b) as f64, (i * j) as f64)
    });
    let mut waves = Waves::new(array, 1.0, 100e3).unwrap();
    waves.normalize();

    let norms = waves
        .intensity()
        .sum_axis(Axis(3))
        .sum_axis(Axis(2));
    assert_eq!(norms.shape(), &[2, 3]);
    for norm in norms.iter() {
        assert_abs_diff_eq!(*norm, 1.0, epsilon = 1e-12);
    }
    assert!(waves.is_finite());
}

#[test]
fn test_image_sums_batch() {
    use approx::assert_abs_diff_eq;
    use ndarray::Array3;

    let array = Array3::from_elem((5, 4, 2), Complex64::new(0.0, 1.0));
    let waves = Waves::new(array, [4.0, 2.0], 100e3).unwrap();

    let (image, extent) = waves.image().unwrap();
    assert_eq!(image.shape(), &[4, 2]);
    assert_abs_diff_eq!(image[[0, 0]], 5.0, epsilon = 1e-12);
    assert_eq!(extent, [0.0, 4.0, 0.0, 2.0]);
}

#[test]
fn test_diffraction_pattern_of_plane_wave_is_centered() {
    use approx::assert_abs_diff_eq;

    let array = Array2::from_elem((8, 6), Complex64::new(1.0, 0.0));
    let waves = Waves::new(array, 1.0, 100e3).unwrap();

    let pattern = waves.diffraction_pattern();
    assert_abs_diff_eq!(pattern[[4, 3]], 48.0 * 48.0, epsilon = 1e-8);
    assert_abs_diff_eq!(pattern.sum(), 48.0 * 48.0, epsilon = 1e-8);
}

use ndarray::{Array, ArrayBase, Axis, Data, DataMut, Dimension, Slice};
use num::complex::Complex64;
use rustfft::{FftDirection, FftPlanner};

/// Forward FFT over the two trailing (spatial) axes. Unnormalized.
///
/// # Panics
/// If `array` has fewer than two dimensions.
pub fn fft2<S, D>(array: &ArrayBase<S, D>) -> Array<Complex64, D>
where
    S: Data<Elem = Complex64>,
    D: Dimension,
{
    let mut transformed = array.to_owned();
    fft2_inplace(&mut transformed);
    transformed
}

/// Inverse FFT over the two trailing (spatial) axes, normalized by `1 / (nx * ny)`
/// so that `ifft2(fft2(x)) == x`.
///
/// # Panics
/// If `array` has fewer than two dimensions.
pub fn ifft2<S, D>(array: &ArrayBase<S, D>) -> Array<Complex64, D>
where
    S: Data<Elem = Complex64>,
    D: Dimension,
{
    let mut transformed = array.to_owned();
    ifft2_inplace(&mut transformed);
    transformed
}

pub fn fft2_inplace<S, D>(array: &mut ArrayBase<S, D>)
where
    S: DataMut<Elem = Complex64>,
    D: Dimension,
{
    let ndim = array.ndim();
    assert!(ndim >= 2, "fft2 needs at least two axes, got {ndim}");
    transform_axis(array, ndim - 2, FftDirection::Forward);
    transform_axis(array, ndim - 1, FftDirection::Forward);
}

pub fn ifft2_inplace<S, D>(array: &mut ArrayBase<S, D>)
where
    S: DataMut<Elem = Complex64>,
    D: Dimension,
{
    let ndim = array.ndim();
    assert!(ndim >= 2, "ifft2 needs at least two axes, got {ndim}");
    transform_axis(array, ndim - 2, FftDirection::Inverse);
    transform_axis(array, ndim - 1, FftDirection::Inverse);

    let norm = 1.0 / (array.len_of(Axis(ndim - 2)) * array.len_of(Axis(ndim - 1))) as f64;
    array.mapv_inplace(|z| z * norm);
}

/// 1D transforms of every lane along `axis`
fn transform_axis<S, D>(array: &mut ArrayBase<S, D>, axis: usize, direction: FftDirection)
where
    S: DataMut<Elem = Complex64>,
    D: Dimension,
{
    let size = array.len_of(Axis(axis));
    if size == 0 {
        return;
    }
    let fft = FftPlanner::<f64>::new().plan_fft(size, direction);

    let mut buffer = vec![Complex64::default(); size];
    for mut lane in array.lanes_mut(Axis(axis)) {
        buffer
            .iter_mut()
            .zip(lane.iter())
            .for_each(|(b, &z)| *b = z);
        fft.process(&mut buffer);
        lane.iter_mut().zip(&buffer).for_each(|(z, &b)| *z = b);
    }
}

/// Moves the zero frequency component of the two trailing axes to the centre
/// (`numpy.fft.fftshift` over those axes).
pub fn fftshift2<A, S, D>(array: &ArrayBase<S, D>) -> Array<A, D>
where
    A: Clone,
    S: Data<Elem = A>,
    D: Dimension,
{
    let ndim = array.ndim();
    assert!(ndim >= 2, "fftshift2 needs at least two axes, got {ndim}");

    let mut shifted = array.to_owned();
    for axis in [Axis(ndim - 2), Axis(ndim - 1)] {
        let n = shifted.len_of(axis);
        let half = n / 2;
        let source = shifted.clone();
        shifted
            .slice_axis_mut(axis, Slice::from(half..))
            .assign(&source.slice_axis(axis, Slice::from(..n - half)));
        shifted
            .slice_axis_mut(axis, Slice::from(..half))
            .assign(&source.slice_axis(axis, Slice::from(n - half..)));
    }
    shifted
}

/// Sample frequencies of a length `n` transform with spacing `d`
/// (`numpy.fft.fftfreq`): `[0, 1, ..., -2, -1] / (n d)`.
pub fn fftfreq(n: usize, d: f64) -> Vec<f64> {
    let positive = (n as i64 + 1) / 2;
    (0..n as i64)
        .map(|i| if i < positive { i } else { i - n as i64 })
        .map(|i| i as f64 / (n as f64 * d))
        .collect()
}

#[test]
fn test_fftfreq_even() {
    // Generate simple k grid and ensure it's correct
    let k_grid = fftfreq(4, 0.25);
    assert_eq!(k_grid, vec![0.0, 1.0, -2.0, -1.0])
}

#[test]
fn test_fftfreq_odd() {
    let k_grid = fftfreq(5, 1.0);
    assert_eq!(k_grid, vec![0.0, 0.2, 0.4, -0.4, -0.2])
}

#[test]
fn test_fft2_round_trip_batched() {
    use approx::assert_abs_diff_eq;
    use ndarray::Array3;

    // A batch of 2 non-square images
    let array = Array3::from_shape_fn((2, 4, 6), |(b, i, j)| {
        Complex64::new((b + i * j) as f64, (i as f64 - j as f64) * 0.5)
    });

    let round_trip = ifft2(&fft2(&array));

    assert_eq!(round_trip.shape(), array.shape());
    assert_abs_diff_eq!(
        (&round_trip - &array).map(|z| z.norm()).sum(),
        0.0,
        epsilon = 1e-10
    );
}

#[test]
fn test_fft2_of_constant_is_a_delta() {
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;

    let array = Array2::from_elem((4, 4), Complex64::new(1.0, 0.0));
    let transformed = fft2(&array);

    assert_abs_diff_eq!(transformed[[0, 0]].re, 16.0, epsilon = 1e-12);
    assert_abs_diff_eq!(
        transformed.map(|z| z.norm()).sum(),
        16.0,
        epsilon = 1e-10
    );
}

#[test]
fn test_fftshift2_matches_fftfreq_order() {
    use ndarray::Array2;

    let freqs = fftfreq(5, 1.0);
    let array = Array2::from_shape_fn((5, 4), |(i, _)| freqs[i]);
    let shifted = fftshift2(&array);

    let column: Vec<f64> = shifted.column(0).to_vec();
    assert_eq!(column, vec![-0.4, -0.2, 0.0, 0.2, 0.4]);
}

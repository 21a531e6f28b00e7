use ndarray::{ArrayD, IxDyn};
use num::complex::Complex64;

/// An array of the given shape filled with `value`.
pub fn complex_constant(value: Complex64, shape: &[usize]) -> ArrayD<Complex64> {
    ArrayD::from_elem(IxDyn(shape), value)
}

/// `exp(i phase)`
pub fn complex_exponential(phase: f64) -> Complex64 {
    Complex64::new(phase.cos(), phase.sin())
}

#[test]
fn test_complex_exponential_unit_modulus() {
    use approx::assert_abs_diff_eq;

    for &phase in &[0.0, 0.3, -2.0, 17.5] {
        let z = complex_exponential(phase);
        assert_abs_diff_eq!(z.norm(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(z.arg(), phase.sin().atan2(phase.cos()), epsilon = 1e-12);
    }
}

//! Contrast transfer function of the objective lens.
//!
//! The aberration phase error χ is expanded in polar coefficients `Cnm` and angles
//! `phinm` up to fifth order, following Kirkland, *Advanced Computing in Electron
//! Microscopy* (2nd ed.), eq. 2.22. Coefficients are in Å, angles in radians.

use ndarray::Array2;
use num::complex::Complex64;
use std::f64::consts::PI;

use crate::{
    energy::Energy,
    utils::{complex::complex_exponential, error::WaveError, grid::Grid},
};

/// Symbols of the polar aberration coefficients
pub const POLAR_SYMBOLS: [&str; 25] = [
    "C10", "C12", "phi12", "C21", "phi21", "C23", "phi23", "C30", "C32", "phi32", "C34", "phi34",
    "C41", "phi41", "C43", "phi43", "C45", "phi45", "C50", "C52", "phi52", "C54", "phi54", "C56",
    "phi56",
];

/// Common names for some of the coefficients. `defocus` is also accepted and sets
/// `C10 = -defocus`.
pub const POLAR_ALIASES: [(&str, &str); 6] = [
    ("astigmatism", "C12"),
    ("astigmatism_angle", "phi12"),
    ("coma", "C21"),
    ("coma_angle", "phi21"),
    ("Cs", "C30"),
    ("C5", "C50"),
];

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aberrations {
    pub c10: f64,
    pub c12: f64,
    pub phi12: f64,
    pub c21: f64,
    pub phi21: f64,
    pub c23: f64,
    pub phi23: f64,
    pub c30: f64,
    pub c32: f64,
    pub phi32: f64,
    pub c34: f64,
    pub phi34: f64,
    pub c41: f64,
    pub phi41: f64,
    pub c43: f64,
    pub phi43: f64,
    pub c45: f64,
    pub phi45: f64,
    pub c50: f64,
    pub c52: f64,
    pub phi52: f64,
    pub c54: f64,
    pub phi54: f64,
    pub c56: f64,
    pub phi56: f64,
}

impl Aberrations {
    pub fn new() -> Aberrations {
        Aberrations::default()
    }

    /// Aberrations from `(symbol, value)` pairs. Symbols may be any of
    /// [`POLAR_SYMBOLS`], [`POLAR_ALIASES`] or `defocus`.
    pub fn from_parameters<'a>(
        parameters: impl IntoIterator<Item = (&'a str, f64)>,
    ) -> Result<Aberrations, WaveError> {
        let mut aberrations = Aberrations::new();
        for (symbol, value) in parameters {
            aberrations.set(symbol, value)?;
        }
        Ok(aberrations)
    }

    pub fn get(&self, symbol: &str) -> Result<f64, WaveError> {
        if symbol == "defocus" {
            return Ok(self.defocus());
        }
        let mut copy = *self;
        let value = copy.slot(symbol)?;
        Ok(*value)
    }

    pub fn set(&mut self, symbol: &str, value: f64) -> Result<(), WaveError> {
        if !value.is_finite() {
            return Err(WaveError::invalid("aberration coefficient", value));
        }
        if symbol == "defocus" {
            self.c10 = -value;
            return Ok(());
        }
        *self.slot(symbol)? = value;
        Ok(())
    }

    /// Defocus [Å], positive for underfocus
    pub fn defocus(&self) -> f64 {
        -self.c10
    }

    fn slot(&mut self, symbol: &str) -> Result<&mut f64, WaveError> {
        let symbol = POLAR_ALIASES
            .iter()
            .find(|(alias, _)| *alias == symbol)
            .map_or(symbol, |(_, canonical)| *canonical);

        Ok(match symbol {
            "C10" => &mut self.c10,
            "C12" => &mut self.c12,
            "phi12" => &mut self.phi12,
            "C21" => &mut self.c21,
            "phi21" => &mut self.phi21,
            "C23" => &mut self.c23,
            "phi23" => &mut self.phi23,
            "C30" => &mut self.c30,
            "C32" => &mut self.c32,
            "phi32" => &mut self.phi32,
            "C34" => &mut self.c34,
            "phi34" => &mut self.phi34,
            "C41" => &mut self.c41,
            "phi41" => &mut self.phi41,
            "C43" => &mut self.c43,
            "phi43" => &mut self.phi43,
            "C45" => &mut self.c45,
            "phi45" => &mut self.phi45,
            "C50" => &mut self.c50,
            "C52" => &mut self.c52,
            "phi52" => &mut self.phi52,
            "C54" => &mut self.c54,
            "phi54" => &mut self.phi54,
            "C56" => &mut self.c56,
            "phi56" => &mut self.phi56,
            _ => return Err(WaveError::UnknownAberration(symbol.to_string())),
        })
    }

    /// Phase error χ [rad] at scattering angle `alpha` [rad] and azimuth `phi` [rad].
    pub fn chi(&self, alpha: f64, phi: f64, wavelength: f64) -> f64 {
        let a = self;
        let alpha2 = alpha * alpha;

        let order1 = 0.5 * alpha2 * (a.c10 + a.c12 * (2.0 * (phi - a.phi12)).cos());

        let order2 = alpha2 * alpha / 3.0
            * (a.c21 * (phi - a.phi21).cos() + a.c23 * (3.0 * (phi - a.phi23)).cos());

        let order3 = 0.25
            * alpha2.powi(2)
            * (a.c30 + a.c32 * (2.0 * (phi - a.phi32)).cos() + a.c34 * (4.0 * (phi - a.phi34)).cos());

        let order4 = 0.2
            * alpha2.powi(2)
            * alpha
            * (a.c41 * (phi - a.phi41).cos()
                + a.c43 * (3.0 * (phi - a.phi43)).cos()
                + a.c45 * (5.0 * (phi - a.phi45)).cos());

        let order5 = alpha2.powi(3) / 6.0
            * (a.c50
                + a.c52 * (2.0 * (phi - a.phi52)).cos()
                + a.c54 * (4.0 * (phi - a.phi54)).cos()
                + a.c56 * (6.0 * (phi - a.phi56)).cos());

        2.0 * PI / wavelength * (order1 + order2 + order3 + order4 + order5)
    }

    /// Radial and azimuthal derivatives of χ, `(dχ/dk, dχ/dφ)`, used by the spatial
    /// coherence envelope.
    pub fn chi_gradient(&self, alpha: f64, phi: f64, wavelength: f64) -> (f64, f64) {
        let a = self;
        let prefactor = 2.0 * PI / wavelength;

        let dchi_dk = prefactor
            * ((a.c12 * (2.0 * (phi - a.phi12)).cos() + a.c10) * alpha
                + (a.c23 * (3.0 * (phi - a.phi23)).cos() + a.c21 * (phi - a.phi21).cos())
                    * alpha.powi(2)
                + (a.c34 * (4.0 * (phi - a.phi34)).cos()
                    + a.c32 * (2.0 * (phi - a.phi32)).cos()
                    + a.c30)
                    * alpha.powi(3)
                + (a.c45 * (5.0 * (phi - a.phi45)).cos()
                    + a.c43 * (3.0 * (phi - a.phi43)).cos()
                    + a.c41 * (phi - a.phi41).cos())
                    * alpha.powi(4)
                + (a.c56 * (6.0 * (phi - a.phi56)).cos()
                    + a.c54 * (4.0 * (phi - a.phi54)).cos()
                    + a.c52 * (2.0 * (phi - a.phi52)).cos()
                    + a.c50)
                    * alpha.powi(5));

        let dchi_dphi = -prefactor
            * (0.5 * (2.0 * a.c12 * (2.0 * (phi - a.phi12)).sin()) * alpha
                + (3.0 * a.c23 * (3.0 * (phi - a.phi23)).sin() + a.c21 * (phi - a.phi21).sin())
                    / 3.0
                    * alpha.powi(2)
                + 0.25
                    * (4.0 * a.c34 * (4.0 * (phi - a.phi34)).sin()
                        + 2.0 * a.c32 * (2.0 * (phi - a.phi32)).sin())
                    * alpha.powi(3)
                + 0.2
                    * (5.0 * a.c45 * (5.0 * (phi - a.phi45)).sin()
                        + 3.0 * a.c43 * (3.0 * (phi - a.phi43)).sin()
                        + a.c41 * (phi - a.phi41).sin())
                    * alpha.powi(4)
                + (6.0 * a.c56 * (6.0 * (phi - a.phi56)).sin()
                    + 4.0 * a.c54 * (4.0 * (phi - a.phi54)).sin()
                    + 2.0 * a.c52 * (2.0 * (phi - a.phi52)).sin())
                    / 6.0
                    * alpha.powi(5));

        (dchi_dk, dchi_dphi)
    }
}

/// Contrast transfer function: aberration phase, aperture and partial coherence
/// envelopes in reciprocal space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ctf {
    /// Aperture semiangle [mrad], infinite for no aperture
    pub semiangle_cutoff: f64,
    /// Width of the cosine taper of the aperture edge, as a fraction of the cutoff
    pub rolloff: f64,
    /// Defocus spread [Å]
    pub focal_spread: f64,
    /// Convergence angle spread [mrad]
    pub angular_spread: f64,
    pub aberrations: Aberrations,
}

impl Default for Ctf {
    fn default() -> Self {
        Ctf {
            semiangle_cutoff: f64::INFINITY,
            rolloff: 0.0,
            focal_spread: 0.0,
            angular_spread: 0.0,
            aberrations: Aberrations::default(),
        }
    }
}

impl Ctf {
    pub fn new() -> Ctf {
        Ctf::default()
    }

    pub fn validate(&self) -> Result<(), WaveError> {
        if self.semiangle_cutoff.is_nan() || self.semiangle_cutoff <= 0.0 {
            return Err(WaveError::invalid("semiangle_cutoff", self.semiangle_cutoff));
        }
        if !(0.0..=1.0).contains(&self.rolloff) {
            return Err(WaveError::invalid("rolloff", self.rolloff));
        }
        if !(self.focal_spread.is_finite() && self.focal_spread >= 0.0) {
            return Err(WaveError::invalid("focal_spread", self.focal_spread));
        }
        if !(self.angular_spread.is_finite() && self.angular_spread >= 0.0) {
            return Err(WaveError::invalid("angular_spread", self.angular_spread));
        }
        Ok(())
    }

    /// Aperture transmission at scattering angle `alpha` [rad]
    pub fn aperture(&self, alpha: f64) -> f64 {
        let cutoff = self.semiangle_cutoff * 1e-3;
        if self.rolloff > 0.0 {
            let rolloff = self.rolloff * cutoff;
            if alpha > cutoff {
                0.0
            } else if alpha > cutoff - rolloff {
                0.5 * (1.0 + (PI * (alpha - cutoff + rolloff) / rolloff).cos())
            } else {
                1.0
            }
        } else if alpha < cutoff {
            1.0
        } else {
            0.0
        }
    }

    /// Damping from the spread of defocus (chromatic aberration and lens current
    /// instability)
    pub fn temporal_envelope(&self, alpha: f64, wavelength: f64) -> f64 {
        (-(0.5 * PI / wavelength * self.focal_spread * alpha.powi(2)).powi(2)).exp()
    }

    /// Damping from the finite source size (partial spatial coherence)
    pub fn spatial_envelope(&self, alpha: f64, phi: f64, wavelength: f64) -> f64 {
        let spread = self.angular_spread * 1e-3;
        let (dchi_dk, dchi_dphi) = self.aberrations.chi_gradient(alpha, phi, wavelength);
        (-spread.signum() * (spread / 2.0).powi(2) * (dchi_dk.powi(2) + dchi_dphi.powi(2))).exp()
    }

    /// Transfer function at scattering angle `alpha` and azimuth `phi` [rad]
    pub fn value(&self, alpha: f64, phi: f64, wavelength: f64) -> Complex64 {
        let mut value = complex_exponential(-self.aberrations.chi(alpha, phi, wavelength));

        if self.semiangle_cutoff.is_finite() {
            value *= self.aperture(alpha);
        }
        if self.focal_spread > 0.0 {
            value *= self.temporal_envelope(alpha, wavelength);
        }
        if self.angular_spread > 0.0 {
            value *= self.spatial_envelope(alpha, phi, wavelength);
        }
        value
    }

    /// The transfer function sampled on the reciprocal space of `grid`, in FFT order
    /// (zero frequency at index `[0, 0]`).
    pub fn evaluate(&self, grid: &Grid, energy: Energy) -> Array2<Complex64> {
        let wavelength = energy.wavelength();
        let (alpha, phi) = scattering_angles(grid, energy);
        ndarray::Zip::from(&alpha)
            .and(&phi)
            .map_collect(|&alpha, &phi| self.value(alpha, phi, wavelength))
    }
}

/// Scattering angle `alpha = λ |k|` and azimuth `phi = atan2(αx, αy)` [rad] of every
/// reciprocal space grid point, in FFT order.
pub fn scattering_angles(grid: &Grid, energy: Energy) -> (Array2<f64>, Array2<f64>) {
    let wavelength = energy.wavelength();
    let [kx, ky] = grid.spatial_frequencies();
    let shape = (kx.len(), ky.len());

    let alpha = Array2::from_shape_fn(shape, |(i, j)| (kx[i] * wavelength).hypot(ky[j] * wavelength));
    let phi = Array2::from_shape_fn(shape, |(i, j)| (kx[i] * wavelength).atan2(ky[j] * wavelength));
    (alpha, phi)
}

#[test]
fn test_aberration_aliases() {
    let mut aberrations = Aberrations::new();
    aberrations.set("Cs", 1.2e5).unwrap();
    aberrations.set("defocus", 50.0).unwrap();
    aberrations.set("astigmatism_angle", 0.3).unwrap();

    assert_eq!(aberrations.c30, 1.2e5);
    assert_eq!(aberrations.get("C30").unwrap(), 1.2e5);
    assert_eq!(aberrations.c10, -50.0);
    assert_eq!(aberrations.get("defocus").unwrap(), 50.0);
    assert_eq!(aberrations.phi12, 0.3);

    assert!(matches!(
        aberrations.set("C99", 1.0),
        Err(WaveError::UnknownAberration(_))
    ));
    assert!(aberrations.set("C12", f64::NAN).is_err());
}

#[test]
fn test_every_polar_symbol_is_settable() {
    let mut aberrations = Aberrations::new();
    for (i, symbol) in POLAR_SYMBOLS.iter().enumerate() {
        aberrations.set(symbol, i as f64 + 1.0).unwrap();
    }
    for (i, symbol) in POLAR_SYMBOLS.iter().enumerate() {
        assert_eq!(aberrations.get(symbol).unwrap(), i as f64 + 1.0);
    }
}

#[test]
fn test_chi_defocus_only() {
    use approx::assert_abs_diff_eq;

    let wavelength = 0.0196875;
    let aberrations = Aberrations::from_parameters([("defocus", 100.0)]).unwrap();

    // χ = π / λ α² C10 with C10 = -defocus
    let alpha = 0.01;
    let expected = PI / wavelength * alpha * alpha * -100.0;
    assert_abs_diff_eq!(aberrations.chi(alpha, 1.3, wavelength), expected, epsilon = 1e-10);

    // Radially symmetric
    assert_abs_diff_eq!(
        aberrations.chi(alpha, 0.0, wavelength),
        aberrations.chi(alpha, 2.0, wavelength),
        epsilon = 1e-12
    );
}

#[test]
fn test_chi_gradient_matches_finite_difference() {
    use approx::assert_abs_diff_eq;

    let wavelength = 0.025;
    let aberrations = Aberrations::from_parameters([
        ("C10", 20.0),
        ("C12", 15.0),
        ("phi12", 0.4),
        ("C30", 1e4),
        ("C23", 300.0),
        ("phi23", -0.2),
    ])
    .unwrap();

    let (alpha, phi) = (0.012, 0.7);
    let h = 1e-7;
    let (dchi_dk, _) = aberrations.chi_gradient(alpha, phi, wavelength);

    // dχ/dk as defined here is the derivative with respect to alpha
    let numeric = (aberrations.chi(alpha + h, phi, wavelength)
        - aberrations.chi(alpha - h, phi, wavelength))
        / (2.0 * h);
    assert_abs_diff_eq!(dchi_dk, numeric, epsilon = 1e-3 * numeric.abs().max(1.0));
}

#[test]
fn test_hard_and_soft_aperture() {
    let ctf = Ctf {
        semiangle_cutoff: 20.0,
        ..Ctf::default()
    };
    assert_eq!(ctf.aperture(0.0), 1.0);
    assert_eq!(ctf.aperture(0.0199), 1.0);
    assert_eq!(ctf.aperture(0.0201), 0.0);

    let soft = Ctf { rolloff: 0.5, ..ctf };
    assert_eq!(soft.aperture(0.009), 1.0);
    assert!((soft.aperture(0.015) - 0.5).abs() < 1e-12);
    assert!(soft.aperture(0.019) < 0.1);
    assert_eq!(soft.aperture(0.021), 0.0);
}

#[test]
fn test_envelopes_damp_high_angles() {
    let wavelength = 0.0196875;
    let ctf = Ctf {
        focal_spread: 30.0,
        angular_spread: 1.0,
        aberrations: Aberrations::from_parameters([("defocus", 100.0)]).unwrap(),
        ..Ctf::default()
    };

    assert_eq!(ctf.temporal_envelope(0.0, wavelength), 1.0);
    assert!(ctf.temporal_envelope(0.02, wavelength) < ctf.temporal_envelope(0.01, wavelength));
    assert_eq!(ctf.spatial_envelope(0.0, 0.0, wavelength), 1.0);
    assert!(ctf.spatial_envelope(0.02, 0.0, wavelength) < 1.0);
}

#[test]
fn test_evaluate_has_unit_modulus_inside_aperture() {
    use approx::assert_abs_diff_eq;

    let grid = Grid::new(20.0, 64usize).unwrap();
    let energy = Energy::new(200e3).unwrap();
    let ctf = Ctf {
        semiangle_cutoff: 25.0,
        aberrations: Aberrations::from_parameters([("defocus", 40.0)]).unwrap(),
        ..Ctf::default()
    };

    let array = ctf.evaluate(&grid, energy);
    let (alpha, _) = scattering_angles(&grid, energy);

    assert_eq!(array.shape(), &[64, 64]);
    assert_abs_diff_eq!(array[[0, 0]].re, 1.0, epsilon = 1e-12);
    for (value, &alpha) in array.iter().zip(alpha.iter()) {
        if alpha < 25.0 * 1e-3 {
            assert_abs_diff_eq!(value.norm(), 1.0, epsilon = 1e-12);
        } else {
            assert_eq!(value.norm(), 0.0);
        }
    }
}

#[test]
fn test_validate() {
    assert!(Ctf::default().validate().is_ok());
    assert!(Ctf { semiangle_cutoff: 0.0, ..Ctf::default() }.validate().is_err());
    assert!(Ctf { rolloff: 1.5, ..Ctf::default() }.validate().is_err());
    assert!(Ctf { focal_spread: -1.0, ..Ctf::default() }.validate().is_err());
    assert!(Ctf { angular_spread: f64::NAN, ..Ctf::default() }.validate().is_err());
}

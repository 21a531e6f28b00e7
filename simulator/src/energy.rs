//! Relativistic electron beam quantities.

use mslice_common::constants::*;
use serde::Serialize;
use std::f64::consts::PI;

use crate::utils::error::WaveError;

/// Kinetic energy of the electron beam [eV]
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize)]
pub struct Energy(f64);

impl Energy {
    pub fn new(energy: f64) -> Result<Energy, WaveError> {
        if energy.is_finite() && energy > 0.0 {
            Ok(Energy(energy))
        } else {
            Err(WaveError::invalid("energy", energy))
        }
    }

    /// Energy in eV
    pub fn value(&self) -> f64 {
        self.0
    }

    /// Relativistic mass [kg]
    pub fn relativistic_mass(&self) -> f64 {
        (1.0 + ELEMENTARY_CHARGE * self.0 / (ELECTRON_MASS * SPEED_OF_LIGHT.powi(2))) * ELECTRON_MASS
    }

    /// Relativistic de Broglie wavelength [Å]
    pub fn wavelength(&self) -> f64 {
        let rest_energy = ELECTRON_MASS * SPEED_OF_LIGHT.powi(2) / ELEMENTARY_CHARGE;
        PLANCK * SPEED_OF_LIGHT / (self.0 * (2.0 * rest_energy + self.0)).sqrt()
            / ELEMENTARY_CHARGE
            / ANGSTROM
    }

    /// Interaction parameter σ [rad / (V Å)]
    pub fn interaction_parameter(&self) -> f64 {
        let wavelength = self.wavelength() * ANGSTROM;
        2.0 * PI * self.relativistic_mass() * ELEMENTARY_CHARGE * wavelength / PLANCK.powi(2)
            * ANGSTROM
    }
}

#[test]
fn test_wavelength_at_common_voltages() {
    use approx::assert_abs_diff_eq;

    // Kirkland, Advanced Computing in Electron Microscopy, table 2.2
    let cases = [(100e3, 0.03701), (200e3, 0.02508), (300e3, 0.01969)];
    for (energy, wavelength) in cases {
        assert_abs_diff_eq!(
            Energy::new(energy).unwrap().wavelength(),
            wavelength,
            epsilon = 1e-5
        );
    }
    assert_abs_diff_eq!(
        Energy::new(300e3).unwrap().wavelength(),
        0.0196875,
        epsilon = 1e-7
    );
}

#[test]
fn test_interaction_parameter() {
    use approx::assert_abs_diff_eq;

    assert_abs_diff_eq!(
        Energy::new(300e3).unwrap().interaction_parameter(),
        6.526e-4,
        epsilon = 1e-6
    );
    assert_abs_diff_eq!(
        Energy::new(100e3).unwrap().interaction_parameter(),
        9.244e-4,
        epsilon = 1e-6
    );
}

#[test]
fn test_relativistic_mass_exceeds_rest_mass() {
    let energy = Energy::new(300e3).unwrap();
    assert!(energy.relativistic_mass() > ELECTRON_MASS);
    // 300 keV is ~59% of the 511 keV rest energy
    let ratio = energy.relativistic_mass() / ELECTRON_MASS;
    assert!((ratio - 1.587).abs() < 1e-3);
}

#[test]
fn test_rejects_non_positive_energy() {
    assert!(matches!(
        Energy::new(0.0),
        Err(WaveError::InvalidParameter { name: "energy", .. })
    ));
    assert!(Energy::new(-300e3).is_err());
    assert!(Energy::new(f64::INFINITY).is_err());
}

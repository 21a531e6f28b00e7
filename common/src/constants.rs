//! Physical constants (CODATA 2018, SI units).

/// Planck constant [J s]
pub const PLANCK: f64 = 6.626_070_15e-34;

/// Speed of light in vacuum [m / s]
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Elementary charge [C]
pub const ELEMENTARY_CHARGE: f64 = 1.602_176_634e-19;

/// Electron rest mass [kg]
pub const ELECTRON_MASS: f64 = 9.109_383_701_5e-31;

/// Metres per Ångström
pub const ANGSTROM: f64 = 1e-10;

/// Fraction of the Nyquist frequency that is free of aliasing once a
/// band-limiting filter has been applied.
pub const ANTIALIAS_FRACTION: f64 = 2.0 / 3.0;

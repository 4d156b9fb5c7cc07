//! Physical constants (SI units unless noted).

/// Gravitational constant (m³ kg⁻¹ s⁻²).
pub const G: f64 = 6.674_30e-11;

/// Stefan-Boltzmann constant (W m⁻² K⁻⁴).
pub const STEFAN_BOLTZMANN: f64 = 5.670_374_419e-8;

/// Seconds in a Julian year (365.25 days).
pub const SECONDS_PER_YEAR: f64 = 31_557_600.0;

/// Pascals per bar.
pub const PA_PER_BAR: f64 = 1.0e5;

/// Astronomical unit (m).
pub const AU: f64 = 1.495_978_707e11;

/// Earth mass (kg).
pub const EARTH_MASS: f64 = 5.972e24;

/// Earth radius (m).
pub const EARTH_RADIUS: f64 = 6.371e6;

/// Solar mass (kg).
pub const SOLAR_MASS: f64 = 1.988_92e30;

/// Solar radius (m).
pub const SOLAR_RADIUS: f64 = 6.957e8;

/// Seconds in a day.
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Planck constant (J s).
pub const PLANCK: f64 = 6.626_070_15e-34;

/// Speed of light in vacuum (m s⁻¹).
pub const SPEED_OF_LIGHT: f64 = 2.997_924_58e8;

/// Boltzmann constant (J K⁻¹).
pub const BOLTZMANN: f64 = 1.380_649e-23;

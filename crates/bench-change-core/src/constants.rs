//! Numerical constants shared across training and inference.

/// ln(2π), used by Gaussian log densities.
pub const LOG_2PI: f64 = 1.837_877_066_409_345_5;

/// Diffusivity of free water at body temperature in µm²/ms.
pub const FREE_WATER_DIFFUSIVITY: f64 = 3.0;

/// Shrinkage added to the diagonal of local sensitivity covariances.
pub const DEFAULT_KNN_SHRINKAGE: f64 = 1e-6;

/// Half-width of the change-amount integration window, in units of the
/// local posterior standard deviation.
pub const QUADRATURE_HALF_WIDTH: f64 = 12.0;

/// Half-width of the change-amount integration window, in units of the
/// amount prior's standard deviation.
pub const PRIOR_HALF_WIDTH: f64 = 8.0;

/// Half-width of the peak search window, in units of the conjugate
/// posterior standard deviation.
pub const PEAK_SEARCH_HALF_WIDTH: f64 = 8.0;

/// Default number of Simpson intervals for the change-amount integral.
pub const DEFAULT_QUADRATURE_POINTS: usize = 512;

/// Decimal places kept when fingerprinting b-values.
pub const BVAL_DECIMALS: i32 = 3;

/// Minimum number of gradient directions needed to fit the l=2 shell invariant.
pub const MIN_DIRECTIONS_FOR_ANISOTROPY: usize = 6;

//! Physical constants and engine defaults

/// Mean Earth radius used by the spherical distance model (m)
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Samples reporting a worse accuracy than this are dropped (m)
pub const DEFAULT_ACCURACY_CEILING_M: f64 = 50.0;

/// Number of raw classifications kept for hysteresis
pub const DEFAULT_HYSTERESIS_WINDOW: usize = 3;

/// Largest hysteresis window a configuration may ask for
pub const MAX_HYSTERESIS_WINDOW: usize = 32;

/// Time without an accepted sample before the state goes stale (ms)
pub const DEFAULT_STALENESS_WINDOW_MS: u64 = 10_000;

pub mod rect;

/// Geometric precision
const EPS: f64 = 1e-13;

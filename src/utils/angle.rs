/// Maps any angle into [0, 360).
pub fn normalize_degrees(deg: f64) -> f64 {
    let n = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if n >= 360.0 { 0.0 } else { n }
}

use rand::Rng;

use crate::error::AppResult;
use crate::models::WheelLayout;
use crate::utils::normalize_degrees;

/// Converts between sector indices and wheel stop angles.
///
/// The wheel turns opposite to the direction sectors are laid out in, so
/// a stop angle `a` leaves the pointer over wheel position `(360 - a) % 360`.
#[derive(Debug, Clone)]
pub struct AngleResolver {
    centers: Vec<f64>,
    sector_width: f64,
    jitter_range: f64,
}

impl AngleResolver {
    /// `jitter_fraction` is the full jitter range as a fraction of the sector
    /// width; it must stay below 1.0 so the offset never reaches a neighbor.
    pub fn new(layout: &WheelLayout, jitter_fraction: f64) -> Self {
        let sector_width = layout.sector_width();
        Self {
            centers: layout.sectors().iter().map(|s| s.center_deg).collect(),
            sector_width,
            jitter_range: sector_width * jitter_fraction.clamp(0.0, 0.999),
        }
    }

    pub fn sector_width(&self) -> f64 {
        self.sector_width
    }

    /// Stop angle in [0, 360) that leaves the pointer on the sector's center.
    pub fn angle_for_sector(&self, index: usize) -> AppResult<f64> {
        let center = self.centers.get(index).copied().ok_or_else(|| {
            crate::error::AppError::ValidationError(format!("Sector index {index} out of range"))
        })?;
        Ok(normalize_degrees(360.0 - center))
    }

    /// Sector under the pointer for any stop angle, full turns included.
    pub fn sector_for_angle(&self, angle: f64) -> usize {
        let wheel_degrees = normalize_degrees(360.0 - normalize_degrees(angle));
        let n = self.centers.len();
        ((wheel_degrees / self.sector_width).floor() as usize) % n
    }

    /// Random offset within ±range/2, always strictly inside half a sector.
    pub fn jitter<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        (rng.r#gen::<f64>() - 0.5) * self.jitter_range
    }

    /// Stop angle for `index` with jitter applied, in [0, 360).
    pub fn jittered_angle_for_sector<R: Rng + ?Sized>(
        &self,
        index: usize,
        rng: &mut R,
    ) -> AppResult<f64> {
        let desired = self.angle_for_sector(index)?;
        Ok(normalize_degrees(desired + self.jitter(rng)))
    }
}

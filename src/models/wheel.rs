use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::WheelConfig;
use crate::error::{AppError, AppResult};

/// A class of spin result with its payout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCategory {
    pub label: String,
    pub payout: i64,
}

/// One equal-width angular slice of the wheel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WheelSector {
    pub index: usize,
    pub start_deg: f64,
    pub end_deg: f64,
    pub center_deg: f64,
    /// Index into `WheelLayout::categories`.
    pub category: usize,
}

/// Sectors and categories, fixed for the lifetime of a session.
#[derive(Debug, Clone)]
pub struct WheelLayout {
    categories: Vec<OutcomeCategory>,
    sectors: Vec<WheelSector>,
}

impl WheelLayout {
    pub fn new(categories: Vec<OutcomeCategory>, sector_labels: &[String]) -> AppResult<Self> {
        if sector_labels.is_empty() {
            return Err(AppError::ConfigError("Wheel needs at least one sector".into()));
        }

        let width = 360.0 / sector_labels.len() as f64;
        let mut sectors = Vec::with_capacity(sector_labels.len());
        for (index, label) in sector_labels.iter().enumerate() {
            let category = categories
                .iter()
                .position(|c| &c.label == label)
                .ok_or_else(|| {
                    AppError::ConfigError(format!("Sector references unknown category {label}"))
                })?;
            let start_deg = index as f64 * width;
            let end_deg = start_deg + width;
            sectors.push(WheelSector {
                index,
                start_deg,
                end_deg,
                center_deg: (start_deg + end_deg) / 2.0,
                category,
            });
        }

        for (ci, category) in categories.iter().enumerate() {
            if !sectors.iter().any(|s| s.category == ci) {
                return Err(AppError::ConfigError(format!(
                    "Category {} has no sector on the wheel",
                    category.label
                )));
            }
        }

        Ok(Self {
            categories,
            sectors,
        })
    }

    pub fn from_config(config: &WheelConfig) -> AppResult<Self> {
        let categories = config
            .categories
            .iter()
            .map(|c| OutcomeCategory {
                label: c.label.clone(),
                payout: c.payout,
            })
            .collect();
        Self::new(categories, &config.sectors)
    }

    pub fn sector_count(&self) -> usize {
        self.sectors.len()
    }

    pub fn sector_width(&self) -> f64 {
        360.0 / self.sectors.len() as f64
    }

    pub fn sectors(&self) -> &[WheelSector] {
        &self.sectors
    }

    pub fn categories(&self) -> &[OutcomeCategory] {
        &self.categories
    }

    pub fn sector(&self, index: usize) -> AppResult<&WheelSector> {
        self.sectors.get(index).ok_or_else(|| {
            AppError::ValidationError(format!(
                "Sector index {index} out of range (0..{})",
                self.sectors.len()
            ))
        })
    }

    pub fn category_of(&self, index: usize) -> AppResult<&OutcomeCategory> {
        let sector = self.sector(index)?;
        Ok(&self.categories[sector.category])
    }

    /// Sector indices whose category label is one of `labels`.
    pub fn indices_with_labels(&self, labels: &[String]) -> Vec<usize> {
        self.sectors
            .iter()
            .filter(|s| labels.contains(&self.categories[s.category].label))
            .map(|s| s.index)
            .collect()
    }
}

/// Produced once per completed spin; consumed once by the reconciler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpinResult {
    pub sector_index: usize,
    pub label: String,
    pub payout: i64,
    /// Total rotation in degrees, full turns included.
    pub stop_angle: f64,
    pub completed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_sectors_partition_full_circle() {
        let layout = WheelLayout::from_config(&WheelConfig::default()).unwrap();
        assert_eq!(layout.sector_count(), 8);
        assert_eq!(layout.sector_width(), 45.0);

        let mut expected_start = 0.0;
        for sector in layout.sectors() {
            assert_eq!(sector.start_deg, expected_start);
            assert_eq!(sector.end_deg - sector.start_deg, 45.0);
            assert_eq!(sector.center_deg, sector.start_deg + 22.5);
            expected_start = sector.end_deg;
        }
        assert_eq!(expected_start, 360.0);
    }

    #[test]
    fn test_unknown_sector_label_is_rejected() {
        let categories = vec![OutcomeCategory {
            label: "a".into(),
            payout: 0,
        }];
        assert!(WheelLayout::new(categories, &labels(&["a", "b"])).is_err());
    }

    #[test]
    fn test_indices_with_labels() {
        let categories = vec![
            OutcomeCategory {
                label: "win".into(),
                payout: 50,
            },
            OutcomeCategory {
                label: "lose".into(),
                payout: 0,
            },
        ];
        let layout =
            WheelLayout::new(categories, &labels(&["win", "lose", "lose", "win"])).unwrap();
        assert_eq!(layout.indices_with_labels(&labels(&["win"])), vec![0, 3]);
        assert_eq!(layout.category_of(2).unwrap().label, "lose");
        assert!(layout.sector(4).is_err());
    }
}

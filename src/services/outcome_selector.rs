use rand::Rng;

use crate::config::WeightingConfig;
use crate::models::WheelLayout;

/// Two-group weighted draw over wheel sectors.
///
/// Sectors whose category is in the favored group are drawn with
/// `favored_probability`, the rest with the complement; inside a group
/// every sector is equally likely.
#[derive(Debug, Clone)]
pub struct OutcomeSelector {
    favored: Vec<usize>,
    remainder: Vec<usize>,
    favored_probability: f64,
    sector_count: usize,
}

impl OutcomeSelector {
    pub fn new(layout: &WheelLayout, weighting: &WeightingConfig) -> Self {
        let favored = layout.indices_with_labels(&weighting.favored);
        let remainder = (0..layout.sector_count())
            .filter(|i| !favored.contains(i))
            .collect();
        Self {
            favored,
            remainder,
            favored_probability: weighting.favored_probability,
            sector_count: layout.sector_count(),
        }
    }

    pub fn favored_indices(&self) -> &[usize] {
        &self.favored
    }

    pub fn remainder_indices(&self) -> &[usize] {
        &self.remainder
    }

    /// Draws one sector index.
    pub fn select<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        // 任一分组为空时退化为全体均匀抽取
        if self.favored.is_empty() || self.remainder.is_empty() {
            return rng.gen_range(0..self.sector_count);
        }

        let group = if rng.r#gen::<f64>() < self.favored_probability {
            &self.favored
        } else {
            &self.remainder
        };
        group[rng.gen_range(0..group.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WheelConfig;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn selector(probability: f64) -> OutcomeSelector {
        let mut config = WheelConfig::default();
        config.weighting.favored_probability = probability;
        let layout = WheelLayout::from_config(&config).unwrap();
        OutcomeSelector::new(&layout, &config.weighting)
    }

    #[test]
    fn test_groups_follow_layout() {
        let s = selector(1.0);
        assert_eq!(s.favored_indices(), &[1, 3, 5, 7]);
        assert_eq!(s.remainder_indices(), &[0, 2, 4, 6]);
    }

    #[test]
    fn test_probability_one_only_returns_favored() {
        let s = selector(1.0);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..5_000 {
            assert!(s.favored_indices().contains(&s.select(&mut rng)));
        }
    }

    #[test]
    fn test_probability_zero_never_returns_favored() {
        let s = selector(0.0);
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..5_000 {
            assert!(!s.favored_indices().contains(&s.select(&mut rng)));
        }
    }

    #[test]
    fn test_even_split_reaches_both_groups() {
        let s = selector(0.5);
        let mut rng = StdRng::seed_from_u64(3);
        let favored_hits = (0..10_000)
            .filter(|_| s.favored_indices().contains(&s.select(&mut rng)))
            .count();
        assert!((4_000..6_000).contains(&favored_hits));
    }

    #[test]
    fn test_empty_group_falls_back_to_uniform() {
        let mut config = WheelConfig::default();
        config.weighting.favored = vec![];
        let layout = WheelLayout::from_config(&config).unwrap();
        let s = OutcomeSelector::new(&layout, &config.weighting);
        let mut rng = StdRng::seed_from_u64(5);
        let mut seen = [false; 8];
        for _ in 0..2_000 {
            seen[s.select(&mut rng)] = true;
        }
        assert!(seen.iter().all(|&hit| hit));
    }
}

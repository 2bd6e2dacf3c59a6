use std::cmp::Ordering;

use serde::Serialize;

/// Quartile-derived boundaries for labeling activity density
/// (activities per active student).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EngagementThresholds {
    pub high: f64,
    pub moderate: f64,
    pub light: f64,
    pub brief: f64,
}

impl Default for EngagementThresholds {
    fn default() -> Self {
        Self {
            high: 10.0,
            moderate: 5.0,
            light: 1.0,
            brief: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementBand {
    High,
    Moderate,
    Light,
    Brief,
    Minimal,
}

impl EngagementBand {
    pub fn label(&self) -> &'static str {
        match self {
            EngagementBand::High => "high",
            EngagementBand::Moderate => "moderate",
            EngagementBand::Light => "light",
            EngagementBand::Brief => "brief",
            EngagementBand::Minimal => "minimal",
        }
    }
}

impl EngagementThresholds {
    /// Derive thresholds from (activity_count, student_count) samples.
    /// Only samples with both values positive contribute; an empty sample
    /// set falls back to the fixed defaults.
    pub fn from_samples(samples: &[(i64, i64)]) -> Self {
        let mut ratios: Vec<f64> = samples
            .iter()
            .filter(|(activities, students)| *activities > 0 && *students > 0)
            .map(|(activities, students)| *activities as f64 / *students as f64)
            .collect();

        if ratios.is_empty() {
            return Self::default();
        }

        ratios.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

        // floor(len * percentile); boundary ties at small N are accepted.
        let at = |percentile: f64| {
            let index = (ratios.len() as f64 * percentile).floor() as usize;
            ratios[index.min(ratios.len() - 1)]
        };

        let light = at(0.25);
        let moderate = at(0.5);
        let high = at(0.75);
        let min_ratio = ratios[0];
        let brief = if min_ratio > 0.0 {
            (light / 2.0).min(min_ratio)
        } else {
            0.1
        };

        Self {
            high,
            moderate,
            light,
            brief,
        }
    }

    pub fn classify(&self, ratio: f64) -> EngagementBand {
        if ratio >= self.high {
            EngagementBand::High
        } else if ratio >= self.moderate {
            EngagementBand::Moderate
        } else if ratio >= self.light {
            EngagementBand::Light
        } else if ratio >= self.brief {
            EngagementBand::Brief
        } else {
            EngagementBand::Minimal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quartiles_follow_floor_indexing() {
        let samples: Vec<(i64, i64)> = (1..=10).map(|n| (n, 1)).collect();
        let thresholds = EngagementThresholds::from_samples(&samples);
        assert_eq!(thresholds.light, 3.0);
        assert_eq!(thresholds.moderate, 6.0);
        assert_eq!(thresholds.high, 8.0);
        assert_eq!(thresholds.brief, 1.0);
    }

    #[test]
    fn degenerate_distribution_collapses_the_percentiles() {
        let samples = vec![(4, 2), (6, 3), (8, 4)];
        let thresholds = EngagementThresholds::from_samples(&samples);
        assert_eq!(thresholds.high, 2.0);
        assert_eq!(thresholds.moderate, 2.0);
        assert_eq!(thresholds.light, 2.0);
        assert_eq!(thresholds.brief, 1.0);
    }

    #[test]
    fn empty_samples_fall_back_to_defaults() {
        let thresholds = EngagementThresholds::from_samples(&[]);
        assert_eq!(thresholds, EngagementThresholds::default());
    }

    #[test]
    fn zero_count_samples_are_excluded() {
        let samples = vec![(0, 5), (10, 0), (-1, 3)];
        let thresholds = EngagementThresholds::from_samples(&samples);
        assert_eq!(thresholds, EngagementThresholds::default());
    }

    #[test]
    fn classification_descends_through_all_five_bands() {
        let thresholds = EngagementThresholds {
            high: 8.0,
            moderate: 6.0,
            light: 3.0,
            brief: 1.0,
        };
        assert_eq!(thresholds.classify(9.0), EngagementBand::High);
        assert_eq!(thresholds.classify(8.0), EngagementBand::High);
        assert_eq!(thresholds.classify(7.0), EngagementBand::Moderate);
        assert_eq!(thresholds.classify(4.0), EngagementBand::Light);
        assert_eq!(thresholds.classify(2.0), EngagementBand::Brief);
        assert_eq!(thresholds.classify(0.5), EngagementBand::Minimal);
    }

    #[test]
    fn brief_prefers_the_minimum_when_below_half_light() {
        let samples = vec![(1, 10), (30, 10), (40, 10), (50, 10)];
        let thresholds = EngagementThresholds::from_samples(&samples);
        assert_eq!(thresholds.light, 3.0);
        assert_eq!(thresholds.brief, 0.1);
    }
}

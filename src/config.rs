// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Decoder configuration.
//!
//! This module defines the [`PoseConfig`] struct, which controls the thresholds used by
//! peak extraction, limb scoring and pose assembly, as well as the worker thread count.

use crate::error::{PoseError, Result};
use crate::limb::LimbScoring;

/// Configuration for pose decoding.
///
/// It uses a builder pattern for convenient construction.
///
/// # Example
///
/// ```rust
/// use paf_pose::PoseConfig;
///
/// let config = PoseConfig::new()
///     .with_confidence(0.1)
///     .with_min_peaks_distance(3.0)
///     .with_min_subset_score(0.2)
///     .with_min_joints(3);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PoseConfig {
    /// Heatmap value a local maximum must exceed to become a candidate.
    pub confidence_threshold: f32,
    /// Minimum Euclidean distance in pixels between two surviving candidates of one type.
    pub min_peaks_distance: f32,
    /// Dot product a PAF sample must exceed to count as supporting the limb.
    pub mid_points_score_threshold: f32,
    /// Fraction of supporting samples required for a limb hypothesis to be valid.
    pub found_mid_points_ratio_threshold: f32,
    /// Poses whose aggregate score falls below this value are discarded.
    pub min_subset_score: f32,
    /// Poses with fewer present keypoints than this are discarded.
    pub min_joints_number: usize,
    /// Number of evenly spaced PAF samples taken along each limb hypothesis.
    pub num_sample_points: usize,
    /// Shift candidates by up to half a pixel using a quadratic fit of the 3x3 neighborhood.
    pub subpixel_refinement: bool,
    /// Number of worker threads.
    /// Setting this to `0` uses the global rayon pool.
    pub num_threads: usize,
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.1,
            min_peaks_distance: 3.0,
            mid_points_score_threshold: 0.05,
            found_mid_points_ratio_threshold: 0.8,
            min_subset_score: 0.2,
            min_joints_number: 3,
            num_sample_points: 10,
            subpixel_refinement: true,
            num_threads: 0,
        }
    }
}

impl PoseConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the heatmap confidence threshold.
    ///
    /// # Arguments
    ///
    /// * `threshold` - Minimum heatmap value for a candidate.
    #[must_use]
    pub const fn with_confidence(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Set the minimum distance between candidates of the same keypoint type.
    #[must_use]
    pub const fn with_min_peaks_distance(mut self, distance: f32) -> Self {
        self.min_peaks_distance = distance;
        self
    }

    /// Set the per-sample PAF score threshold.
    #[must_use]
    pub const fn with_mid_points_score_threshold(mut self, threshold: f32) -> Self {
        self.mid_points_score_threshold = threshold;
        self
    }

    /// Set the fraction of supporting samples a limb needs to be valid.
    ///
    /// # Arguments
    ///
    /// * `ratio` - Fraction in `[0, 1]`.
    #[must_use]
    pub const fn with_found_mid_points_ratio(mut self, ratio: f32) -> Self {
        self.found_mid_points_ratio_threshold = ratio;
        self
    }

    /// Set the minimum aggregate score of an output pose.
    #[must_use]
    pub const fn with_min_subset_score(mut self, score: f32) -> Self {
        self.min_subset_score = score;
        self
    }

    /// Set the minimum number of present keypoints of an output pose.
    #[must_use]
    pub const fn with_min_joints(mut self, joints: usize) -> Self {
        self.min_joints_number = joints;
        self
    }

    /// Set the number of PAF samples per limb hypothesis.
    #[must_use]
    pub const fn with_sample_points(mut self, points: usize) -> Self {
        self.num_sample_points = points;
        self
    }

    /// Enable or disable sub-pixel refinement of candidate positions.
    #[must_use]
    pub const fn with_subpixel(mut self, enabled: bool) -> Self {
        self.subpixel_refinement = enabled;
        self
    }

    /// Set the number of worker threads.
    ///
    /// # Arguments
    ///
    /// * `threads` - Number of threads. Set to `0` to use the global rayon pool.
    #[must_use]
    pub const fn with_threads(mut self, threads: usize) -> Self {
        self.num_threads = threads;
        self
    }

    /// Parameters consumed by the limb scorer.
    #[must_use]
    pub const fn limb_scoring(&self) -> LimbScoring {
        LimbScoring {
            num_sample_points: self.num_sample_points,
            mid_points_score_threshold: self.mid_points_score_threshold,
            found_mid_points_ratio_threshold: self.found_mid_points_ratio_threshold,
        }
    }

    /// Check that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::ConfigError`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let finite = [
            ("confidence_threshold", self.confidence_threshold),
            ("min_peaks_distance", self.min_peaks_distance),
            ("mid_points_score_threshold", self.mid_points_score_threshold),
            (
                "found_mid_points_ratio_threshold",
                self.found_mid_points_ratio_threshold,
            ),
            ("min_subset_score", self.min_subset_score),
        ];
        if let Some((name, value)) = finite.iter().find(|(_, v)| !v.is_finite()) {
            return Err(PoseError::ConfigError(format!(
                "{name} must be finite, got {value}"
            )));
        }
        if self.min_peaks_distance < 0.0 {
            return Err(PoseError::ConfigError(format!(
                "min_peaks_distance must be non-negative, got {}",
                self.min_peaks_distance
            )));
        }
        if !(0.0..=1.0).contains(&self.found_mid_points_ratio_threshold) {
            return Err(PoseError::ConfigError(format!(
                "found_mid_points_ratio_threshold must be within [0, 1], got {}",
                self.found_mid_points_ratio_threshold
            )));
        }
        if self.num_sample_points < 2 {
            return Err(PoseError::ConfigError(format!(
                "num_sample_points must be at least 2, got {}",
                self.num_sample_points
            )));
        }
        if self.min_joints_number == 0 {
            return Err(PoseError::ConfigError(
                "min_joints_number must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = PoseConfig::default();
        assert!((config.confidence_threshold - 0.1).abs() < f32::EPSILON);
        assert!((config.min_peaks_distance - 3.0).abs() < f32::EPSILON);
        assert!((config.mid_points_score_threshold - 0.05).abs() < f32::EPSILON);
        assert!((config.found_mid_points_ratio_threshold - 0.8).abs() < f32::EPSILON);
        assert!((config.min_subset_score - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.min_joints_number, 3);
        assert_eq!(config.num_sample_points, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = PoseConfig::new()
            .with_confidence(0.3)
            .with_min_peaks_distance(5.0)
            .with_min_joints(4)
            .with_sample_points(20)
            .with_subpixel(false)
            .with_threads(2);

        assert!((config.confidence_threshold - 0.3).abs() < f32::EPSILON);
        assert!((config.min_peaks_distance - 5.0).abs() < f32::EPSILON);
        assert_eq!(config.min_joints_number, 4);
        assert_eq!(config.num_sample_points, 20);
        assert!(!config.subpixel_refinement);
        assert_eq!(config.num_threads, 2);

        let scoring = config.limb_scoring();
        assert_eq!(scoring.num_sample_points, 20);
    }

    #[test]
    fn test_config_validation() {
        assert!(PoseConfig::new().with_sample_points(1).validate().is_err());
        assert!(PoseConfig::new().with_min_joints(0).validate().is_err());
        assert!(PoseConfig::new()
            .with_found_mid_points_ratio(1.5)
            .validate()
            .is_err());
        assert!(PoseConfig::new()
            .with_min_peaks_distance(-1.0)
            .validate()
            .is_err());

        let err = PoseConfig::new()
            .with_confidence(f32::NAN)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("confidence_threshold"));
    }
}

// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Limb compatibility scoring.
//!
//! A limb hypothesis between two candidates is scored by sampling the part affinity
//! field along the segment joining them and projecting each sample onto the segment
//! direction, a discrete line integral over the vector field.

use ndarray::ArrayView2;

use crate::peaks::Peak;

/// Parameters of the PAF line integral.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimbScoring {
    /// Evenly spaced samples taken from the first to the second candidate, both included.
    pub num_sample_points: usize,
    /// A sample supports the limb when its projection exceeds this value.
    pub mid_points_score_threshold: f32,
    /// Minimum fraction of supporting samples for a valid limb.
    pub found_mid_points_ratio_threshold: f32,
}

impl Default for LimbScoring {
    fn default() -> Self {
        Self {
            num_sample_points: 10,
            mid_points_score_threshold: 0.05,
            found_mid_points_ratio_threshold: 0.8,
        }
    }
}

/// Outcome of scoring one limb hypothesis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimbScore {
    /// Mean projection of the supporting samples plus the length penalty.
    pub score: f32,
    /// Whether enough samples support the limb.
    pub valid: bool,
}

impl LimbScore {
    const INVALID: Self = Self {
        score: 0.0,
        valid: false,
    };
}

/// Score the limb hypothesis from `a` to `b` against a PAF channel pair.
///
/// Samples are read at the nearest pixel and clamped to the map. The score is the mean
/// projection over supporting samples plus `min(0.5 * height / length - 1, 0)`, which
/// penalizes limbs longer than half the map height. Coincident candidates, empty maps
/// and hypotheses with no supporting sample are invalid.
///
/// # Arguments
///
/// * `a` - Candidate at the start of the limb.
/// * `b` - Candidate at the end of the limb.
/// * `paf_x` - PAF x-component map of shape (height, width).
/// * `paf_y` - PAF y-component map, same shape as `paf_x`.
/// * `params` - Sampling parameters.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn score_limb(
    a: &Peak,
    b: &Peak,
    paf_x: ArrayView2<f32>,
    paf_y: ArrayView2<f32>,
    params: &LimbScoring,
) -> LimbScore {
    let (height, width) = paf_x.dim();
    if height == 0 || width == 0 || paf_y.dim() != (height, width) {
        return LimbScore::INVALID;
    }

    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let length = dx.hypot(dy);
    if length == 0.0 || !length.is_finite() {
        return LimbScore::INVALID;
    }
    let (ux, uy) = (dx / length, dy / length);

    let samples = params.num_sample_points.max(2);
    let steps = (samples - 1) as f32;
    let (step_x, step_y) = (dx / steps, dy / steps);
    let (max_col, max_row) = ((width - 1) as f32, (height - 1) as f32);

    let mut supported_sum = 0.0f32;
    let mut supported = 0usize;
    for n in 0..samples {
        let col = (n as f32).mul_add(step_x, a.x).round().clamp(0.0, max_col) as usize;
        let row = (n as f32).mul_add(step_y, a.y).round().clamp(0.0, max_row) as usize;
        let projection = ux.mul_add(paf_x[[row, col]], uy * paf_y[[row, col]]);
        if projection > params.mid_points_score_threshold {
            supported_sum += projection;
            supported += 1;
        }
    }
    if supported == 0 {
        return LimbScore::INVALID;
    }

    let penalty = (0.5 * height as f32 / length - 1.0).min(0.0);
    let score = supported_sum / supported as f32 + penalty;
    let ratio = supported as f32 / samples as f32;

    LimbScore {
        score,
        valid: score.is_finite() && ratio >= params.found_mid_points_ratio_threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn peak(id: usize, x: f32, y: f32) -> Peak {
        Peak {
            id,
            keypoint: 0,
            x,
            y,
            score: 1.0,
        }
    }

    #[test]
    fn test_aligned_field_scores_one() {
        let paf_x = Array2::from_elem((64, 64), 1.0f32);
        let paf_y = Array2::zeros((64, 64));
        let a = peak(0, 10.0, 20.0);
        let b = peak(1, 30.0, 20.0);

        let result = score_limb(&a, &b, paf_x.view(), paf_y.view(), &LimbScoring::default());
        assert!(result.valid);
        assert!((result.score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_opposite_direction_invalid() {
        let paf_x = Array2::from_elem((64, 64), 1.0f32);
        let paf_y = Array2::zeros((64, 64));
        let a = peak(0, 30.0, 20.0);
        let b = peak(1, 10.0, 20.0);

        let result = score_limb(&a, &b, paf_x.view(), paf_y.view(), &LimbScoring::default());
        assert!(!result.valid);
    }

    #[test]
    fn test_coincident_candidates_invalid() {
        let paf_x = Array2::from_elem((16, 16), 1.0f32);
        let paf_y = Array2::zeros((16, 16));
        let a = peak(0, 5.0, 5.0);

        let result = score_limb(&a, &a, paf_x.view(), paf_y.view(), &LimbScoring::default());
        assert_eq!(result, LimbScore::INVALID);
    }

    #[test]
    fn test_long_limb_penalized() {
        // Height 20, limb of length 30: penalty = 0.5 * 20 / 30 - 1 = -2/3.
        let paf_x = Array2::from_elem((20, 40), 1.0f32);
        let paf_y = Array2::zeros((20, 40));
        let a = peak(0, 2.0, 10.0);
        let b = peak(1, 32.0, 10.0);

        let result = score_limb(&a, &b, paf_x.view(), paf_y.view(), &LimbScoring::default());
        assert!(result.valid);
        assert!((result.score - (1.0 - 2.0 / 3.0)).abs() < 1e-5);
    }

    #[test]
    fn test_ratio_threshold() {
        // Supporting field only on the left part of the segment: samples at x = 0..=9
        // land on columns 0..=9, of which columns 0..=7 are supporting.
        let mut paf_x = Array2::zeros((32, 32));
        for row in 0..32 {
            for col in 0..8 {
                paf_x[[row, col]] = 1.0f32;
            }
        }
        let paf_y = Array2::zeros((32, 32));
        let a = peak(0, 0.0, 4.0);
        let b = peak(1, 9.0, 4.0);

        let strict = LimbScoring::default();
        let result = score_limb(&a, &b, paf_x.view(), paf_y.view(), &strict);
        assert!(result.valid, "8 of 10 samples meet a 0.8 ratio");

        let stricter = LimbScoring {
            found_mid_points_ratio_threshold: 0.9,
            ..strict
        };
        let result = score_limb(&a, &b, paf_x.view(), paf_y.view(), &stricter);
        assert!(!result.valid);
        assert!((result.score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_samples_clamped_to_map() {
        let paf_x = Array2::from_elem((8, 8), 1.0f32);
        let paf_y = Array2::zeros((8, 8));
        let a = peak(0, -0.4, 3.0);
        let b = peak(1, 7.4, 3.0);

        let result = score_limb(&a, &b, paf_x.view(), paf_y.view(), &LimbScoring::default());
        assert!(result.valid);
    }
}

// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Decoding results.
//!
//! Coordinates are in heatmap pixels; rescaling to the source image is left to the caller.

use ndarray::{Array2, Array3};

use crate::peaks::CandidateTable;

/// Timing information for decoding stages (in milliseconds).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Speed {
    /// Time spent extracting peaks.
    pub peaks: Option<f64>,
    /// Time spent scoring and matching limbs.
    pub matching: Option<f64>,
    /// Time spent merging associations into poses.
    pub merge: Option<f64>,
}

impl Speed {
    /// Create a new Speed instance with all timings.
    #[must_use]
    pub const fn new(peaks: f64, matching: f64, merge: f64) -> Self {
        Self {
            peaks: Some(peaks),
            matching: Some(matching),
            merge: Some(merge),
        }
    }

    /// Get total decoding time in milliseconds.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.peaks.unwrap_or(0.0) + self.matching.unwrap_or(0.0) + self.merge.unwrap_or(0.0)
    }
}

/// One keypoint of an output pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    /// Column coordinate, `-1` when absent.
    pub x: f32,
    /// Row coordinate, `-1` when absent.
    pub y: f32,
    /// Heatmap confidence, `0` when absent.
    pub score: f32,
}

impl Keypoint {
    /// Sentinel for a keypoint type missing from a pose.
    pub const ABSENT: Self = Self {
        x: -1.0,
        y: -1.0,
        score: 0.0,
    };

    /// Create a new keypoint.
    #[must_use]
    pub const fn new(x: f32, y: f32, score: f32) -> Self {
        Self { x, y, score }
    }

    /// Whether this keypoint was detected.
    #[must_use]
    pub fn is_present(&self) -> bool {
        *self != Self::ABSENT
    }
}

/// A detected person.
#[derive(Debug, Clone, PartialEq)]
pub struct Pose {
    /// One entry per keypoint type, [`Keypoint::ABSENT`] where missing.
    pub keypoints: Vec<Keypoint>,
    /// Candidate ID per keypoint type.
    pub candidates: Vec<Option<usize>>,
    /// Sum of member confidences and limb scores.
    pub aggregate_score: f32,
    /// Plausibility score: `aggregate_score * (keypoint_count - 1)`.
    pub score: f32,
    /// Number of present keypoints.
    pub keypoint_count: usize,
}

impl Pose {
    /// Create a pose from resolved keypoints.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(
        keypoints: Vec<Keypoint>,
        candidates: Vec<Option<usize>>,
        aggregate_score: f32,
        keypoint_count: usize,
    ) -> Self {
        let score = aggregate_score * keypoint_count.saturating_sub(1) as f32;
        Self {
            keypoints,
            candidates,
            aggregate_score,
            score,
            keypoint_count,
        }
    }

    /// Keypoint of a given type.
    #[must_use]
    pub fn get(&self, keypoint: usize) -> Option<&Keypoint> {
        self.keypoints.get(keypoint)
    }

    /// Keypoint coordinates with shape (K, 2).
    #[must_use]
    pub fn xy(&self) -> Array2<f32> {
        Array2::from_shape_fn((self.keypoints.len(), 2), |(k, c)| {
            let kp = &self.keypoints[k];
            if c == 0 {
                kp.x
            } else {
                kp.y
            }
        })
    }
}

/// Output of one decoding pass.
#[derive(Debug, Clone)]
pub struct DecodeResult {
    /// Poses in assembly order.
    pub poses: Vec<Pose>,
    /// All candidates with their global IDs.
    pub candidates: CandidateTable,
    /// Stage timings.
    pub speed: Speed,
}

impl DecodeResult {
    /// Number of poses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.poses.len()
    }

    /// Check if no pose was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    /// All poses as an array of shape (N, K, 3) holding `x, y, score`.
    ///
    /// `K` is the keypoint count of the candidate table.
    #[must_use]
    pub fn keypoints(&self) -> Array3<f32> {
        let k = self.candidates.keypoint_count();
        Array3::from_shape_fn((self.poses.len(), k, 3), |(n, j, c)| {
            let kp = self.poses[n].keypoints.get(j).unwrap_or(&Keypoint::ABSENT);
            match c {
                0 => kp.x,
                1 => kp.y,
                _ => kp.score,
            }
        })
    }

    /// Short summary, e.g. `2 poses, 31 candidates`.
    #[must_use]
    pub fn verbose(&self) -> String {
        let poses = self.poses.len();
        let candidates = self.candidates.len();
        format!(
            "{poses} pose{}, {candidates} candidate{}",
            if poses == 1 { "" } else { "s" },
            if candidates == 1 { "" } else { "s" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peaks::Peak;

    fn sample_result() -> DecodeResult {
        let peak = |x: f32| Peak {
            id: 0,
            keypoint: 0,
            x,
            y: 2.0,
            score: 0.5,
        };
        let candidates = CandidateTable::from_per_type(vec![vec![peak(1.0)], vec![peak(4.0)]]);
        let pose = Pose::new(
            vec![Keypoint::new(1.0, 2.0, 0.5), Keypoint::ABSENT],
            vec![Some(0), None],
            1.5,
            1,
        );
        DecodeResult {
            poses: vec![pose],
            candidates,
            speed: Speed::default(),
        }
    }

    #[test]
    fn test_speed() {
        let speed = Speed::new(1.0, 2.5, 0.5);
        assert!((speed.total() - 4.0).abs() < 1e-9);
        assert!((Speed::default().total()).abs() < 1e-9);
    }

    #[test]
    fn test_keypoint_absent() {
        assert!(!Keypoint::ABSENT.is_present());
        assert!(Keypoint::new(0.0, 0.0, 0.3).is_present());
    }

    #[test]
    fn test_pose_score() {
        let pose = Pose::new(vec![Keypoint::ABSENT; 4], vec![None; 4], 2.0, 3);
        assert!((pose.score - 4.0).abs() < 1e-6);

        let single = Pose::new(vec![Keypoint::ABSENT], vec![None], 2.0, 1);
        assert!(single.score.abs() < 1e-6);
    }

    #[test]
    fn test_pose_xy() {
        let result = sample_result();
        let xy = result.poses[0].xy();
        assert_eq!(xy.shape(), &[2, 2]);
        assert!((xy[[0, 0]] - 1.0).abs() < 1e-6);
        assert!((xy[[1, 1]] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_result_keypoints_array() {
        let result = sample_result();
        let data = result.keypoints();
        assert_eq!(data.shape(), &[1, 2, 3]);
        assert!((data[[0, 0, 2]] - 0.5).abs() < 1e-6);
        assert!((data[[0, 1, 0]] + 1.0).abs() < 1e-6);
        assert!(data[[0, 1, 2]].abs() < 1e-6);
        assert_eq!(result.len(), 1);
        assert!(!result.is_empty());
        assert_eq!(result.verbose(), "1 pose, 2 candidates");
    }
}

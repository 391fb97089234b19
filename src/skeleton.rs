// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Limb topology.
//!
//! A [`Skeleton`] lists the keypoint types and the limbs joining them. Each limb names
//! the two PAF channels (x and y components) that encode its direction field. The limb
//! order is the order in which pose assembly consumes associations, so it is part of the
//! observable output.

use crate::error::{PoseError, Result};

/// A limb joining two keypoint types through a pair of PAF channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LimbDefinition {
    /// Keypoint type at the start of the limb.
    pub keypoint_a: usize,
    /// Keypoint type at the end of the limb.
    pub keypoint_b: usize,
    /// PAF channel holding the x component.
    pub paf_x: usize,
    /// PAF channel holding the y component.
    pub paf_y: usize,
    /// Fill-only limb: may complete an existing pose but never starts or merges one.
    pub redundant: bool,
}

impl LimbDefinition {
    /// Create a regular limb.
    #[must_use]
    pub const fn new(keypoint_a: usize, keypoint_b: usize, paf_x: usize, paf_y: usize) -> Self {
        Self {
            keypoint_a,
            keypoint_b,
            paf_x,
            paf_y,
            redundant: false,
        }
    }

    /// Create a fill-only limb.
    #[must_use]
    pub const fn redundant(keypoint_a: usize, keypoint_b: usize, paf_x: usize, paf_y: usize) -> Self {
        Self {
            keypoint_a,
            keypoint_b,
            paf_x,
            paf_y,
            redundant: true,
        }
    }
}

/// Keypoint names of the 18-point COCO OpenPose layout.
pub const COCO_KEYPOINT_NAMES: [&str; 18] = [
    "nose",
    "neck",
    "right_shoulder",
    "right_elbow",
    "right_wrist",
    "left_shoulder",
    "left_elbow",
    "left_wrist",
    "right_hip",
    "right_knee",
    "right_ankle",
    "left_hip",
    "left_knee",
    "left_ankle",
    "right_eye",
    "left_eye",
    "right_ear",
    "left_ear",
];

/// Limbs of the 18-point COCO OpenPose layout, in assembly order.
pub const COCO_LIMBS: [LimbDefinition; 19] = [
    LimbDefinition::new(1, 2, 12, 13),  // neck to right shoulder
    LimbDefinition::new(1, 5, 20, 21),  // neck to left shoulder
    LimbDefinition::new(2, 3, 14, 15),  // right shoulder to right elbow
    LimbDefinition::new(3, 4, 16, 17),  // right elbow to right wrist
    LimbDefinition::new(5, 6, 22, 23),  // left shoulder to left elbow
    LimbDefinition::new(6, 7, 24, 25),  // left elbow to left wrist
    LimbDefinition::new(1, 8, 0, 1),    // neck to right hip
    LimbDefinition::new(8, 9, 2, 3),    // right hip to right knee
    LimbDefinition::new(9, 10, 4, 5),   // right knee to right ankle
    LimbDefinition::new(1, 11, 6, 7),   // neck to left hip
    LimbDefinition::new(11, 12, 8, 9),  // left hip to left knee
    LimbDefinition::new(12, 13, 10, 11), // left knee to left ankle
    LimbDefinition::new(1, 0, 28, 29),  // neck to nose
    LimbDefinition::new(0, 14, 30, 31), // nose to right eye
    LimbDefinition::new(14, 16, 34, 35), // right eye to right ear
    LimbDefinition::new(0, 15, 32, 33), // nose to left eye
    LimbDefinition::new(15, 17, 36, 37), // left eye to left ear
    LimbDefinition::redundant(2, 16, 18, 19), // right shoulder to right ear
    LimbDefinition::redundant(5, 17, 26, 27), // left shoulder to left ear
];

/// Keypoint types plus the ordered limb table connecting them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skeleton {
    keypoint_count: usize,
    limbs: Vec<LimbDefinition>,
}

impl Skeleton {
    /// Build a skeleton, checking its topology.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::SkeletonError`] if a limb references a keypoint type outside
    /// `0..keypoint_count`, joins a type to itself, uses one PAF channel for both
    /// components, or if some keypoint type is not covered by any limb.
    pub fn new(keypoint_count: usize, limbs: Vec<LimbDefinition>) -> Result<Self> {
        let mut covered = vec![false; keypoint_count];
        for (index, limb) in limbs.iter().enumerate() {
            if limb.keypoint_a >= keypoint_count || limb.keypoint_b >= keypoint_count {
                return Err(PoseError::SkeletonError(format!(
                    "limb {index} joins keypoints ({}, {}) but only {keypoint_count} types exist",
                    limb.keypoint_a, limb.keypoint_b
                )));
            }
            if limb.keypoint_a == limb.keypoint_b {
                return Err(PoseError::SkeletonError(format!(
                    "limb {index} joins keypoint {} to itself",
                    limb.keypoint_a
                )));
            }
            if limb.paf_x == limb.paf_y {
                return Err(PoseError::SkeletonError(format!(
                    "limb {index} uses PAF channel {} for both components",
                    limb.paf_x
                )));
            }
            covered[limb.keypoint_a] = true;
            covered[limb.keypoint_b] = true;
        }
        if let Some(orphan) = covered.iter().position(|c| !c) {
            return Err(PoseError::SkeletonError(format!(
                "keypoint {orphan} is not part of any limb"
            )));
        }
        Ok(Self {
            keypoint_count,
            limbs,
        })
    }

    /// The 18-keypoint, 19-limb COCO layout produced by OpenPose-style networks.
    #[must_use]
    pub fn openpose_coco() -> Self {
        Self {
            keypoint_count: COCO_KEYPOINT_NAMES.len(),
            limbs: COCO_LIMBS.to_vec(),
        }
    }

    /// Number of keypoint types.
    #[must_use]
    pub const fn keypoint_count(&self) -> usize {
        self.keypoint_count
    }

    /// Limbs in assembly order.
    #[must_use]
    pub fn limbs(&self) -> &[LimbDefinition] {
        &self.limbs
    }

    /// Number of PAF channels the limb table requires.
    #[must_use]
    pub fn paf_channel_count(&self) -> usize {
        self.limbs
            .iter()
            .map(|limb| limb.paf_x.max(limb.paf_y) + 1)
            .max()
            .unwrap_or(0)
    }
}

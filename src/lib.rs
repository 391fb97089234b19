// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! # PAF Pose Decoding Library
//!
//! Multi-person 2D pose assembly for bottom-up keypoint networks of the OpenPose
//! family. Given one heatmap per keypoint type and one pair of part affinity field (PAF)
//! channels per limb, the decoder:
//!
//! 1. finds keypoint candidates on every heatmap (in parallel),
//! 2. scores every candidate pair of every limb with a line integral over its PAF and
//!    keeps a greedy best-first matching per limb,
//! 3. merges the per-limb associations into complete, non-overlapping skeletons.
//!
//! Running the network, resizing its outputs to a common resolution and mapping the
//! resulting coordinates back to the source image are left to the caller.
//!
//! ## Quick Start
//!
//! ```rust
//! use ndarray::Array3;
//! use paf_pose::{PoseConfig, PoseDecoder};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PoseConfig::new().with_confidence(0.1);
//! let decoder = PoseDecoder::openpose_coco(config)?;
//!
//! // 18 keypoint heatmaps + background, 19 limbs x 2 PAF components.
//! let heatmaps = Array3::<f32>::zeros((19, 96, 128));
//! let pafs = Array3::<f32>::zeros((38, 96, 128));
//!
//! let result = decoder.decode(heatmaps.view(), pafs.view())?;
//! for pose in &result.poses {
//!     println!("pose with {} keypoints, score {:.2}", pose.keypoint_count, pose.score);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom Topologies
//!
//! ```rust
//! use paf_pose::{LimbDefinition, PoseConfig, PoseDecoder, Skeleton};
//!
//! // Three keypoints in a chain, PAF channels (0, 1) and (2, 3).
//! let skeleton = Skeleton::new(
//!     3,
//!     vec![LimbDefinition::new(0, 1, 0, 1), LimbDefinition::new(1, 2, 2, 3)],
//! )?;
//! let decoder = PoseDecoder::new(PoseConfig::default(), skeleton)?;
//! assert_eq!(decoder.skeleton().limbs().len(), 2);
//! # Ok::<(), paf_pose::PoseError>(())
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`decoder`] | [`PoseDecoder`] pipeline driver |
//! | [`peaks`] | Candidate extraction ([`find_peaks`], [`CandidateTable`]) |
//! | [`limb`] | PAF line-integral scoring ([`score_limb`]) |
//! | [`assembler`] | Limb matching and pose merging |
//! | [`skeleton`] | Limb topology ([`Skeleton`], [`LimbDefinition`]) |
//! | [`results`] | Output types ([`Pose`], [`Keypoint`], [`DecodeResult`]) |
//! | [`config`] | [`PoseConfig`] builder |
//! | [`error`] | Error types ([`PoseError`], [`Result`]) |

// Modules
pub mod assembler;
pub mod config;
pub mod decoder;
pub mod error;
pub mod limb;
pub mod logging;
pub mod peaks;
pub mod results;
pub mod skeleton;

// Re-export main types for convenience
pub use assembler::{assemble, match_limb, Association, PoseSubset, SubsetRegistry};
pub use config::PoseConfig;
pub use decoder::PoseDecoder;
pub use error::{PoseError, Result};
pub use limb::{score_limb, LimbScore, LimbScoring};
pub use peaks::{find_peaks, CandidateTable, Peak};
pub use results::{DecodeResult, Keypoint, Pose, Speed};
pub use skeleton::{LimbDefinition, Skeleton, COCO_KEYPOINT_NAMES, COCO_LIMBS};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

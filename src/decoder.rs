// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Pose decoding pipeline.
//!
//! [`PoseDecoder`] checks the map stacks, extracts candidates for every keypoint type in
//! parallel, assigns global IDs once all types are done, matches every limb in parallel
//! and finally merges the associations sequentially in limb order.

use std::time::Instant;

use ndarray::{ArrayView3, Axis};
use rayon::prelude::*;

use crate::assembler::{assemble, match_limb, Association};
use crate::config::PoseConfig;
use crate::error::{PoseError, Result};
use crate::peaks::{find_peaks, CandidateTable};
use crate::results::{DecodeResult, Speed};
use crate::skeleton::Skeleton;
use crate::{verbose, warn};

/// Multi-person pose decoder for heatmap + PAF network outputs.
///
/// # Example
///
/// ```rust
/// use ndarray::Array3;
/// use paf_pose::{PoseConfig, PoseDecoder};
///
/// let decoder = PoseDecoder::openpose_coco(PoseConfig::default())?;
/// let heatmaps = Array3::<f32>::zeros((19, 64, 64));
/// let pafs = Array3::<f32>::zeros((38, 64, 64));
///
/// let result = decoder.decode(heatmaps.view(), pafs.view())?;
/// assert!(result.is_empty());
/// # Ok::<(), paf_pose::PoseError>(())
/// ```
#[derive(Debug)]
pub struct PoseDecoder {
    config: PoseConfig,
    skeleton: Skeleton,
    pool: Option<rayon::ThreadPool>,
}

impl PoseDecoder {
    /// Create a decoder for a skeleton.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::ConfigError`] if the configuration is invalid or the
    /// dedicated thread pool cannot be built.
    pub fn new(config: PoseConfig, skeleton: Skeleton) -> Result<Self> {
        config.validate()?;
        let pool = if config.num_threads > 0 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(config.num_threads)
                    .build()?,
            )
        } else {
            None
        };
        Ok(Self {
            config,
            skeleton,
            pool,
        })
    }

    /// Create a decoder for the 18-keypoint COCO OpenPose layout.
    ///
    /// # Errors
    ///
    /// Same as [`PoseDecoder::new`].
    pub fn openpose_coco(config: PoseConfig) -> Result<Self> {
        Self::new(config, Skeleton::openpose_coco())
    }

    /// Decoder configuration.
    #[must_use]
    pub const fn config(&self) -> &PoseConfig {
        &self.config
    }

    /// Limb topology.
    #[must_use]
    pub const fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    /// Validate the map stacks against each other and the skeleton.
    ///
    /// # Arguments
    ///
    /// * `heatmaps` - Keypoint heatmaps of shape (channels, height, width). Channels past
    ///   the skeleton's keypoint count, such as a background channel, are ignored.
    /// * `pafs` - PAF components of shape (channels, height, width).
    ///
    /// # Errors
    ///
    /// * [`PoseError::ShapeMismatch`] if the stacks differ in height or width.
    /// * [`PoseError::ChannelMismatch`] if a stack lacks channels the skeleton uses.
    pub fn check_shapes(&self, heatmaps: ArrayView3<f32>, pafs: ArrayView3<f32>) -> Result<()> {
        let (_, heat_h, heat_w) = heatmaps.dim();
        let (_, paf_h, paf_w) = pafs.dim();
        if (heat_h, heat_w) != (paf_h, paf_w) {
            return Err(PoseError::ShapeMismatch(format!(
                "heatmaps are {heat_h}x{heat_w} but PAFs are {paf_h}x{paf_w}"
            )));
        }
        self.check_heatmap_channels(heatmaps)?;

        let needed = self.skeleton.paf_channel_count();
        if pafs.len_of(Axis(0)) < needed {
            return Err(PoseError::ChannelMismatch(format!(
                "skeleton needs {needed} PAF channels, got {}",
                pafs.len_of(Axis(0))
            )));
        }
        Ok(())
    }

    fn check_heatmap_channels(&self, heatmaps: ArrayView3<f32>) -> Result<()> {
        let channels = heatmaps.len_of(Axis(0));
        let keypoints = self.skeleton.keypoint_count();
        if channels < keypoints {
            return Err(PoseError::ChannelMismatch(format!(
                "skeleton needs {keypoints} heatmap channels, got {channels}"
            )));
        }
        if channels > keypoints + 1 {
            warn!(
                "Ignoring {} extra heatmap channels (expected {keypoints} keypoints plus background).",
                channels - keypoints - 1
            );
        }
        Ok(())
    }

    fn run<T: Send>(&self, op: impl FnOnce() -> T + Send) -> T {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    /// Extract candidates for every keypoint type and assign global IDs.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::ChannelMismatch`] if there are fewer heatmaps than keypoint types.
    pub fn find_candidates(&self, heatmaps: ArrayView3<f32>) -> Result<CandidateTable> {
        self.check_heatmap_channels(heatmaps)?;
        Ok(self.run(|| self.extract_candidates(heatmaps)))
    }

    fn extract_candidates(&self, heatmaps: ArrayView3<f32>) -> CandidateTable {
        let config = &self.config;
        let per_type: Vec<_> = (0..self.skeleton.keypoint_count())
            .into_par_iter()
            .map(|keypoint| {
                find_peaks(
                    heatmaps.index_axis(Axis(0), keypoint),
                    keypoint,
                    config.min_peaks_distance,
                    config.confidence_threshold,
                    config.subpixel_refinement,
                )
            })
            .collect();
        CandidateTable::from_per_type(per_type)
    }

    fn match_limbs(&self, candidates: &CandidateTable, pafs: ArrayView3<f32>) -> Vec<Vec<Association>> {
        let params = self.config.limb_scoring();
        self.skeleton
            .limbs()
            .par_iter()
            .map(|limb| {
                match_limb(
                    candidates.of_type(limb.keypoint_a),
                    candidates.of_type(limb.keypoint_b),
                    pafs.index_axis(Axis(0), limb.paf_x),
                    pafs.index_axis(Axis(0), limb.paf_y),
                    &params,
                )
            })
            .collect()
    }

    /// Decode all poses from one frame's network output.
    ///
    /// # Arguments
    ///
    /// * `heatmaps` - Keypoint heatmaps of shape (channels, height, width).
    /// * `pafs` - PAF components of shape (channels, height, width).
    ///
    /// # Errors
    ///
    /// Fails only on the shape preconditions of [`PoseDecoder::check_shapes`].
    pub fn decode(&self, heatmaps: ArrayView3<f32>, pafs: ArrayView3<f32>) -> Result<DecodeResult> {
        self.check_shapes(heatmaps, pafs)?;

        let start = Instant::now();
        let candidates = self.run(|| self.extract_candidates(heatmaps));
        let peaks_ms = start.elapsed().as_secs_f64() * 1000.0;

        let start = Instant::now();
        let associations = self.run(|| self.match_limbs(&candidates, pafs));
        let matching_ms = start.elapsed().as_secs_f64() * 1000.0;

        let start = Instant::now();
        let poses = assemble(
            &self.skeleton,
            &candidates,
            &associations,
            self.config.min_joints_number,
            self.config.min_subset_score,
        );
        let merge_ms = start.elapsed().as_secs_f64() * 1000.0;

        let result = DecodeResult {
            poses,
            candidates,
            speed: Speed::new(peaks_ms, matching_ms, merge_ms),
        };
        verbose!(
            "{} ({:.1}ms peaks, {:.1}ms matching, {:.1}ms merge)",
            result.verbose(),
            peaks_ms,
            matching_ms,
            merge_ms
        );
        Ok(result)
    }
}

// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Keypoint candidate extraction.
//!
//! [`find_peaks`] turns one keypoint heatmap into local-maximum candidates, and
//! [`CandidateTable`] gathers the per-type results and assigns global IDs.

use std::ops::Range;

use ndarray::ArrayView2;

/// A keypoint candidate localized on a heatmap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    /// Candidate ID. Local discovery index until the candidate table assigns global IDs.
    pub id: usize,
    /// Keypoint type (heatmap channel) the candidate was found on.
    pub keypoint: usize,
    /// Column coordinate in pixels.
    pub x: f32,
    /// Row coordinate in pixels.
    pub y: f32,
    /// Heatmap value at the integer maximum.
    pub score: f32,
}

impl Peak {
    /// Euclidean distance to another candidate.
    #[must_use]
    pub fn distance(&self, other: &Self) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Heatmap value at `(y, x)`, reading zero outside the map.
fn value_at(heatmap: &ArrayView2<f32>, y: Option<usize>, x: Option<usize>) -> f32 {
    match (y, x) {
        (Some(y), Some(x)) => heatmap.get((y, x)).copied().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Vertex offset of the parabola through `(-1, prev)`, `(0, center)`, `(1, next)`.
fn quadratic_offset(prev: f32, center: f32, next: f32) -> f32 {
    let curvature = prev - 2.0 * center + next;
    if curvature < 0.0 {
        (0.5 * (prev - next) / curvature).clamp(-0.5, 0.5)
    } else {
        0.0
    }
}

/// Extract local-maximum candidates from a single keypoint heatmap.
///
/// A pixel is a candidate when its value exceeds `threshold` and is strictly greater
/// than its four direct neighbors (pixels outside the map read as zero). Candidates are
/// visited in row-major order; a new candidate closer than `min_distance` to an already
/// accepted one survives only if its score is strictly higher, in which case the weaker
/// neighbors are dropped. Ties keep the candidate found first.
///
/// # Arguments
///
/// * `heatmap` - Score map of shape (height, width).
/// * `keypoint` - Keypoint type recorded on each candidate.
/// * `min_distance` - Suppression radius in pixels.
/// * `threshold` - Confidence threshold.
/// * `subpixel` - Refine positions with a quadratic fit of the neighborhood.
///
/// # Returns
///
/// Candidates in discovery order with local IDs `0..n`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn find_peaks(
    heatmap: ArrayView2<f32>,
    keypoint: usize,
    min_distance: f32,
    threshold: f32,
    subpixel: bool,
) -> Vec<Peak> {
    let within = |a: (usize, usize), b: (usize, usize)| {
        let dy = a.0 as f32 - b.0 as f32;
        let dx = a.1 as f32 - b.1 as f32;
        dx.hypot(dy) < min_distance
    };

    let mut accepted: Vec<((usize, usize), f32)> = Vec::new();
    for ((y, x), &value) in heatmap.indexed_iter() {
        if value.is_nan() || value <= threshold {
            continue;
        }
        let up = value_at(&heatmap, y.checked_sub(1), Some(x));
        let down = value_at(&heatmap, Some(y + 1), Some(x));
        let left = value_at(&heatmap, Some(y), x.checked_sub(1));
        let right = value_at(&heatmap, Some(y), Some(x + 1));
        if !(value > up && value > down && value > left && value > right) {
            continue;
        }

        let site = (y, x);
        if accepted
            .iter()
            .any(|&(other, score)| score >= value && within(other, site))
        {
            continue;
        }
        accepted.retain(|&(other, _)| !within(other, site));
        accepted.push((site, value));
    }

    accepted
        .into_iter()
        .enumerate()
        .map(|(id, ((y, x), score))| {
            let (mut px, mut py) = (x as f32, y as f32);
            if subpixel {
                let left = value_at(&heatmap, Some(y), x.checked_sub(1));
                let right = value_at(&heatmap, Some(y), Some(x + 1));
                let up = value_at(&heatmap, y.checked_sub(1), Some(x));
                let down = value_at(&heatmap, Some(y + 1), Some(x));
                px += quadratic_offset(left, score, right);
                py += quadratic_offset(up, score, down);
            }
            Peak {
                id,
                keypoint,
                x: px,
                y: py,
                score,
            }
        })
        .collect()
}

/// Candidates of every keypoint type, with globally unique IDs.
///
/// IDs are contiguous per type and increase with the type index: type 0 owns
/// `0..n0`, type 1 owns `n0..n0 + n1`, and so on. A candidate's ID is its index in
/// the flat table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateTable {
    peaks: Vec<Peak>,
    offsets: Vec<usize>,
}

impl CandidateTable {
    /// Assign global IDs to per-type candidate lists.
    ///
    /// # Arguments
    ///
    /// * `per_type` - Candidates of each keypoint type, indexed by type, in discovery order.
    #[must_use]
    pub fn from_per_type(per_type: Vec<Vec<Peak>>) -> Self {
        let total = per_type.iter().map(Vec::len).sum();
        let mut peaks = Vec::with_capacity(total);
        let mut offsets = Vec::with_capacity(per_type.len() + 1);
        offsets.push(0);
        for (keypoint, candidates) in per_type.into_iter().enumerate() {
            for mut peak in candidates {
                peak.id = peaks.len();
                peak.keypoint = keypoint;
                peaks.push(peak);
            }
            offsets.push(peaks.len());
        }
        Self { peaks, offsets }
    }

    /// Number of keypoint types in the table.
    #[must_use]
    pub fn keypoint_count(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// Total number of candidates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    /// Check if no candidate was found at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    /// ID range owned by a keypoint type. Empty for unknown types.
    #[must_use]
    pub fn id_range(&self, keypoint: usize) -> Range<usize> {
        match (self.offsets.get(keypoint), self.offsets.get(keypoint + 1)) {
            (Some(&start), Some(&end)) => start..end,
            _ => 0..0,
        }
    }

    /// Candidates of one keypoint type.
    #[must_use]
    pub fn of_type(&self, keypoint: usize) -> &[Peak] {
        &self.peaks[self.id_range(keypoint)]
    }

    /// Candidate by global ID.
    #[must_use]
    pub fn get(&self, id: usize) -> Option<&Peak> {
        self.peaks.get(id)
    }

    /// Candidate counts per keypoint type.
    #[must_use]
    pub fn counts(&self) -> Vec<usize> {
        self.offsets.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// Iterate over all candidates in ID order.
    pub fn iter(&self) -> std::slice::Iter<'_, Peak> {
        self.peaks.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn gaussian(height: usize, width: usize, cx: f32, cy: f32, amplitude: f32) -> Array2<f32> {
        Array2::from_shape_fn((height, width), |(y, x)| {
            #[allow(clippy::cast_precision_loss)]
            let (dx, dy) = (x as f32 - cx, y as f32 - cy);
            amplitude * (-(dx * dx + dy * dy) / (2.0 * 2.0 * 2.0)).exp()
        })
    }

    #[test]
    fn test_single_gaussian_peak() {
        let heatmap = gaussian(64, 64, 50.0, 50.0, 0.9);
        let peaks = find_peaks(heatmap.view(), 0, 3.0, 0.1, true);

        assert_eq!(peaks.len(), 1);
        assert!((peaks[0].x - 50.0).abs() < 1e-4);
        assert!((peaks[0].y - 50.0).abs() < 1e-4);
        assert!((peaks[0].score - 0.9).abs() < 1e-6);
        assert_eq!(peaks[0].id, 0);
    }

    #[test]
    fn test_close_peaks_keep_higher_score() {
        let mut heatmap = Array2::zeros((20, 20));
        heatmap[[10, 10]] = 0.5;
        heatmap[[10, 12]] = 0.8;
        let peaks = find_peaks(heatmap.view(), 0, 3.0, 0.1, false);

        assert_eq!(peaks.len(), 1);
        assert!((peaks[0].x - 12.0).abs() < f32::EPSILON);
        assert!((peaks[0].score - 0.8).abs() < f32::EPSILON);

        let mut heatmap = Array2::zeros((20, 20));
        heatmap[[10, 10]] = 0.8;
        heatmap[[11, 12]] = 0.5;
        let peaks = find_peaks(heatmap.view(), 0, 3.0, 0.1, false);
        assert_eq!(peaks.len(), 1);
        assert!((peaks[0].x - 10.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_close_peaks_tie_keeps_first() {
        let mut heatmap = Array2::zeros((20, 20));
        heatmap[[10, 12]] = 0.5;
        heatmap[[11, 10]] = 0.5;
        let peaks = find_peaks(heatmap.view(), 0, 3.0, 0.1, false);

        assert_eq!(peaks.len(), 1);
        assert!((peaks[0].x - 12.0).abs() < f32::EPSILON);
        assert!((peaks[0].y - 10.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_distant_peaks_in_scan_order() {
        let mut heatmap = Array2::zeros((30, 30));
        heatmap[[20, 5]] = 0.4;
        heatmap[[5, 20]] = 0.9;
        let peaks = find_peaks(heatmap.view(), 3, 3.0, 0.1, false);

        assert_eq!(peaks.len(), 2);
        // Row-major discovery, not score order.
        assert!((peaks[0].y - 5.0).abs() < f32::EPSILON);
        assert!((peaks[1].y - 20.0).abs() < f32::EPSILON);
        assert_eq!(peaks[1].id, 1);
        assert!(peaks.iter().all(|p| p.keypoint == 3));
    }

    #[test]
    fn test_threshold_and_plateau() {
        let mut heatmap = Array2::zeros((10, 10));
        heatmap[[2, 2]] = 0.05;
        heatmap[[6, 6]] = 0.7;
        heatmap[[6, 7]] = 0.7;
        let peaks = find_peaks(heatmap.view(), 0, 3.0, 0.1, false);
        assert!(peaks.is_empty());
    }

    #[test]
    fn test_border_peak_detected() {
        let mut heatmap = Array2::zeros((10, 10));
        heatmap[[0, 9]] = 0.6;
        let peaks = find_peaks(heatmap.view(), 0, 3.0, 0.1, true);
        assert_eq!(peaks.len(), 1);
        assert!((peaks[0].x - 9.0).abs() < f32::EPSILON);
        assert!((peaks[0].y - 0.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_nan_values_ignored() {
        let mut heatmap = Array2::zeros((10, 10));
        heatmap[[3, 3]] = f32::NAN;
        heatmap[[7, 7]] = 0.5;
        let peaks = find_peaks(heatmap.view(), 0, 3.0, 0.1, false);
        assert_eq!(peaks.len(), 1);
        assert!((peaks[0].x - 7.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_subpixel_shift_towards_higher_neighbor() {
        let mut heatmap = Array2::zeros((10, 10));
        heatmap[[5, 4]] = 0.2;
        heatmap[[5, 5]] = 1.0;
        heatmap[[5, 6]] = 0.6;
        let peaks = find_peaks(heatmap.view(), 0, 3.0, 0.1, true);

        assert_eq!(peaks.len(), 1);
        // curvature = 0.2 - 2.0 + 0.6 = -1.2, offset = 0.5 * (0.2 - 0.6) / -1.2
        assert!((peaks[0].x - (5.0 + 1.0 / 6.0)).abs() < 1e-5);
        assert!((peaks[0].y - 5.0).abs() < 1e-6);
        assert!(peaks[0].x - 5.0 <= 0.5);
    }

    #[test]
    fn test_higher_threshold_never_adds_peaks() {
        let heatmap = gaussian(40, 40, 10.0, 10.0, 0.3) + gaussian(40, 40, 30.0, 25.0, 0.8);
        let mut previous = usize::MAX;
        for threshold in [0.0, 0.1, 0.25, 0.5, 0.9] {
            let count = find_peaks(heatmap.view(), 0, 3.0, threshold, true).len();
            assert!(count <= previous);
            previous = count;
        }
        assert_eq!(previous, 0);
    }

    #[test]
    fn test_candidate_table_ids_contiguous() {
        let peak = |x: f32| Peak {
            id: 0,
            keypoint: 0,
            x,
            y: 0.0,
            score: 0.5,
        };
        let table = CandidateTable::from_per_type(vec![
            vec![peak(1.0), peak(2.0)],
            vec![],
            vec![peak(3.0), peak(4.0), peak(5.0)],
        ]);

        assert_eq!(table.keypoint_count(), 3);
        assert_eq!(table.len(), 5);
        assert_eq!(table.counts(), vec![2, 0, 3]);
        assert_eq!(table.id_range(0), 0..2);
        assert_eq!(table.id_range(1), 2..2);
        assert_eq!(table.id_range(2), 2..5);
        assert_eq!(table.id_range(7), 0..0);
        assert!(table.of_type(1).is_empty());

        for (id, peak) in table.iter().enumerate() {
            assert_eq!(peak.id, id);
        }
        assert_eq!(table.get(4).map(|p| p.keypoint), Some(2));
        assert!((table.get(2).unwrap().x - 3.0).abs() < f32::EPSILON);
        assert!(table.get(5).is_none());
    }
}

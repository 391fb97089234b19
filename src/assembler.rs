// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Pose assembly.
//!
//! Assembly runs in two stages that must stay separate:
//!
//! 1. [`match_limb`] pairs candidates of the two keypoint types of one limb, greedily
//!    by descending compatibility, so each candidate joins at most one instance of that
//!    limb.
//! 2. [`SubsetRegistry`] consumes the accepted [`Association`]s limb by limb, in table
//!    order, growing and merging partial poses. The result depends on this order.
//!
//! Partial poses live in an arena; candidates point at their owning subset by index.

use ndarray::ArrayView2;

use crate::limb::{score_limb, LimbScoring};
use crate::peaks::{CandidateTable, Peak};
use crate::results::{Keypoint, Pose};
use crate::skeleton::{LimbDefinition, Skeleton};

/// An accepted pairing of two candidates through one limb.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Association {
    /// Global ID of the candidate of the limb's first keypoint type.
    pub first: usize,
    /// Global ID of the candidate of the limb's second keypoint type.
    pub second: usize,
    /// Limb compatibility score.
    pub score: f32,
    /// Position in the greedy acceptance order of the limb, starting at 0.
    pub rank: usize,
}

/// Match candidates of a limb's two keypoint types.
///
/// Every pair in the cross product is scored; pairs that are valid with a positive
/// score are sorted by descending score, ties going to the lower sum of candidate IDs,
/// and accepted top-down unless one of the two candidates is already taken.
///
/// # Arguments
///
/// * `candidates_a` - Candidates of the limb's first keypoint type.
/// * `candidates_b` - Candidates of the limb's second keypoint type.
/// * `paf_x` - PAF x-component map of the limb.
/// * `paf_y` - PAF y-component map of the limb.
/// * `params` - Limb scoring parameters.
///
/// # Returns
///
/// Associations in acceptance order.
#[must_use]
pub fn match_limb(
    candidates_a: &[Peak],
    candidates_b: &[Peak],
    paf_x: ArrayView2<f32>,
    paf_y: ArrayView2<f32>,
    params: &LimbScoring,
) -> Vec<Association> {
    let mut scored = Vec::with_capacity(candidates_a.len() * candidates_b.len());
    for a in candidates_a {
        for b in candidates_b {
            let limb = score_limb(a, b, paf_x, paf_y, params);
            if limb.valid && limb.score > 0.0 {
                scored.push((a.id, b.id, limb.score));
            }
        }
    }
    scored.sort_by(|l, r| r.2.total_cmp(&l.2).then_with(|| (l.0 + l.1).cmp(&(r.0 + r.1))));

    let limit = candidates_a.len().min(candidates_b.len());
    let mut used_a = Vec::with_capacity(limit);
    let mut used_b = Vec::with_capacity(limit);
    let mut associations = Vec::with_capacity(limit);
    for (first, second, score) in scored {
        if associations.len() == limit {
            break;
        }
        if used_a.contains(&first) || used_b.contains(&second) {
            continue;
        }
        used_a.push(first);
        used_b.push(second);
        associations.push(Association {
            first,
            second,
            score,
            rank: associations.len(),
        });
    }
    associations
}

/// A partial pose: one optional candidate per keypoint type.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseSubset {
    /// Candidate ID per keypoint type.
    pub slots: Vec<Option<usize>>,
    /// Sum of member confidences and accepted limb scores.
    pub score: f32,
    /// Number of occupied slots.
    pub count: usize,
}

impl PoseSubset {
    fn empty(keypoint_count: usize) -> Self {
        Self {
            slots: vec![None; keypoint_count],
            score: 0.0,
            count: 0,
        }
    }

    /// Whether two subsets both occupy some keypoint type.
    fn conflicts_with(&self, other: &Self) -> bool {
        self.slots
            .iter()
            .zip(&other.slots)
            .any(|(a, b)| a.is_some() && b.is_some())
    }
}

/// Arena of partial poses plus the candidate-to-subset ownership index.
///
/// A candidate belongs to at most one subset, so no candidate can end up in two
/// output poses.
#[derive(Debug)]
pub struct SubsetRegistry<'a> {
    candidates: &'a CandidateTable,
    subsets: Vec<Option<PoseSubset>>,
    owner: Vec<Option<usize>>,
}

impl<'a> SubsetRegistry<'a> {
    /// Create an empty registry over a candidate table.
    #[must_use]
    pub fn new(candidates: &'a CandidateTable) -> Self {
        Self {
            candidates,
            subsets: Vec::new(),
            owner: vec![None; candidates.len()],
        }
    }

    fn confidence(&self, id: usize) -> f32 {
        self.candidates.get(id).map_or(0.0, |peak| peak.score)
    }

    fn keypoint_of(&self, id: usize) -> Option<usize> {
        self.candidates.get(id).map(|peak| peak.keypoint)
    }

    /// Subset index owning a candidate.
    #[must_use]
    pub fn owner_of(&self, id: usize) -> Option<usize> {
        self.owner.get(id).copied().flatten()
    }

    /// Live subsets in creation order.
    pub fn subsets(&self) -> impl Iterator<Item = &PoseSubset> {
        self.subsets.iter().flatten()
    }

    /// Start a single-keypoint subset for each unowned candidate of a keypoint type.
    pub fn seed_unpaired(&mut self, keypoint: usize) {
        for id in self.candidates.id_range(keypoint) {
            if self.owner[id].is_some() {
                continue;
            }
            let mut subset = PoseSubset::empty(self.candidates.keypoint_count());
            subset.slots[keypoint] = Some(id);
            subset.score = self.confidence(id);
            subset.count = 1;
            self.owner[id] = Some(self.subsets.len());
            self.subsets.push(Some(subset));
        }
    }

    /// Fold one association of `limb` into the registry.
    ///
    /// * Neither candidate owned: a new two-keypoint subset is started.
    /// * One owned: the other is attached to its subset if that slot is still free.
    /// * Both owned by different subsets: the subsets merge unless they overlap on a
    ///   keypoint type, in which case the association is dropped.
    ///
    /// Fill-only limbs only ever attach.
    pub fn add_association(&mut self, limb: &LimbDefinition, association: &Association) {
        let (first, second) = (association.first, association.second);
        if self.keypoint_of(first) != Some(limb.keypoint_a)
            || self.keypoint_of(second) != Some(limb.keypoint_b)
        {
            return;
        }
        match (self.owner[first], self.owner[second]) {
            (Some(a), Some(b)) if a == b => {}
            (Some(a), Some(b)) => {
                if !limb.redundant {
                    self.merge(a, b, association.score);
                }
            }
            (Some(a), None) => self.attach(a, limb.keypoint_b, second, association.score),
            (None, Some(b)) => self.attach(b, limb.keypoint_a, first, association.score),
            (None, None) => {
                if !limb.redundant {
                    self.spawn(limb, association);
                }
            }
        }
    }

    fn spawn(&mut self, limb: &LimbDefinition, association: &Association) {
        let mut subset = PoseSubset::empty(self.candidates.keypoint_count());
        subset.slots[limb.keypoint_a] = Some(association.first);
        subset.slots[limb.keypoint_b] = Some(association.second);
        subset.score = self.confidence(association.first)
            + self.confidence(association.second)
            + association.score;
        subset.count = 2;

        let index = self.subsets.len();
        self.owner[association.first] = Some(index);
        self.owner[association.second] = Some(index);
        self.subsets.push(Some(subset));
    }

    fn attach(&mut self, index: usize, keypoint: usize, id: usize, limb_score: f32) {
        if self.keypoint_of(id) != Some(keypoint) {
            return;
        }
        let confidence = self.confidence(id);
        let Some(subset) = self.subsets[index].as_mut() else {
            return;
        };
        if subset.slots[keypoint].is_some() {
            return;
        }
        subset.slots[keypoint] = Some(id);
        subset.score += confidence + limb_score;
        subset.count += 1;
        self.owner[id] = Some(index);
    }

    fn merge(&mut self, a: usize, b: usize, limb_score: f32) {
        let (keep, absorb) = (a.min(b), a.max(b));
        let compatible = match (&self.subsets[keep], &self.subsets[absorb]) {
            (Some(kept), Some(absorbed)) => !kept.conflicts_with(absorbed),
            _ => false,
        };
        if !compatible {
            return;
        }
        let Some(absorbed) = self.subsets[absorb].take() else {
            return;
        };
        let Some(kept) = self.subsets[keep].as_mut() else {
            return;
        };
        for (slot, incoming) in kept.slots.iter_mut().zip(&absorbed.slots) {
            if let Some(id) = *incoming {
                *slot = Some(id);
                self.owner[id] = Some(keep);
            }
        }
        kept.score += absorbed.score + limb_score;
        kept.count += absorbed.count;
    }

    /// Turn surviving subsets into poses, in creation order.
    ///
    /// Subsets with fewer than `min_joints` keypoints or an aggregate score below
    /// `min_score` are dropped.
    #[must_use]
    pub fn finalize(self, min_joints: usize, min_score: f32) -> Vec<Pose> {
        let candidates = self.candidates;
        self.subsets
            .into_iter()
            .flatten()
            .filter(|subset| subset.count >= min_joints && subset.score >= min_score)
            .map(|subset| {
                let keypoints = subset
                    .slots
                    .iter()
                    .map(|slot| {
                        slot.and_then(|id| candidates.get(id))
                            .map_or(Keypoint::ABSENT, |peak| {
                                Keypoint::new(peak.x, peak.y, peak.score)
                            })
                    })
                    .collect();
                Pose::new(keypoints, subset.slots, subset.score, subset.count)
            })
            .collect()
    }
}

/// Merge per-limb associations into poses.
///
/// `associations[k]` holds the output of [`match_limb`] for `skeleton.limbs()[k]`. Limbs
/// are consumed in table order. A limb with candidates on only one side seeds
/// single-keypoint subsets for the unowned candidates of that side, so later limbs can
/// still grow them.
///
/// # Arguments
///
/// * `skeleton` - Limb topology.
/// * `candidates` - Candidate table with global IDs.
/// * `associations` - Accepted associations per limb, in table order.
/// * `min_joints` - Minimum number of present keypoints per pose.
/// * `min_score` - Minimum aggregate score per pose.
#[must_use]
pub fn assemble(
    skeleton: &Skeleton,
    candidates: &CandidateTable,
    associations: &[Vec<Association>],
    min_joints: usize,
    min_score: f32,
) -> Vec<Pose> {
    let mut registry = SubsetRegistry::new(candidates);
    for (limb, accepted) in skeleton.limbs().iter().zip(associations) {
        let has_a = !candidates.of_type(limb.keypoint_a).is_empty();
        let has_b = !candidates.of_type(limb.keypoint_b).is_empty();
        match (has_a, has_b) {
            (false, false) => {}
            (true, false) => registry.seed_unpaired(limb.keypoint_a),
            (false, true) => registry.seed_unpaired(limb.keypoint_b),
            (true, true) => {
                for association in accepted {
                    registry.add_association(limb, association);
                }
            }
        }
    }
    registry.finalize(min_joints, min_score)
}

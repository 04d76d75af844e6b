//! MOT metrics accumulator for tracking evaluation.
//!
//! Event semantics follow py-motmetrics.
//! License: MIT (Christoph Heindl, Jack Valmadre)

use std::collections::{HashMap, HashSet};

use nalgebra::DMatrix;

use crate::internal::scipy::linear_sum_assignment;

/// Fraction of frames an object must be tracked to count as mostly tracked.
pub const MOSTLY_TRACKED_RATIO: f64 = 0.8;
/// Below this fraction of tracked frames an object counts as mostly lost.
pub const MOSTLY_LOST_RATIO: f64 = 0.2;

/// Event types for MOT evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Object matched to the hypothesis it was already assigned to (or a fresh pairing)
    Match,
    /// Object matched to a different hypothesis than before
    Switch,
    /// Hypothesis matched to a different object than before
    Transfer,
    /// Switch to a hypothesis never seen before
    Ascend,
    /// Transfer onto an object never matched before
    Migrate,
    /// Object without hypothesis
    Miss,
    /// Hypothesis without object
    FalsePositive,
}

impl EventType {
    /// Primary events, one per object/hypothesis per frame.
    fn is_primary(self) -> bool {
        matches!(
            self,
            EventType::Match | EventType::Switch | EventType::Miss | EventType::FalsePositive
        )
    }

    fn is_detection(self) -> bool {
        matches!(self, EventType::Match | EventType::Switch)
    }
}

/// Single tracking event.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub frame_id: i32,
    pub event_type: EventType,
    pub object_id: Option<i32>,
    pub hypothesis_id: Option<i32>,
    pub distance: Option<f64>,
}

/// Accumulator for MOT metrics computation.
///
/// Collects tracking events frame by frame. Frames must be fed in increasing order.
#[derive(Debug, Default)]
pub struct MOTAccumulator {
    events: Vec<Event>,
    num_frames: usize,
    /// object_id -> hypothesis_id of the latest correspondence
    object_to_hyp: HashMap<i32, i32>,
    /// hypothesis_id -> object_id of the latest correspondence
    hyp_to_object: HashMap<i32, i32>,
    /// object_id -> frame of the latest match
    last_match: HashMap<i32, i32>,
    /// Hypotheses seen in any earlier frame, matched or not
    hyp_history: HashSet<i32>,
    last_update_frame: Option<i32>,
    /// (object_id, hypothesis_id) -> frames in which the pair was matchable
    pair_counts: HashMap<(i32, i32), usize>,
}

impl MOTAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the accumulator with one frame.
    ///
    /// # Arguments
    /// * `frame_id` - Current frame number
    /// * `object_ids` - Ground truth object IDs present in this frame
    /// * `hypothesis_ids` - Predicted track IDs present in this frame
    /// * `distances` - Distance matrix (objects x hypotheses), `NaN` for pairs that may not match
    pub fn update(
        &mut self,
        frame_id: i32,
        object_ids: &[i32],
        hypothesis_ids: &[i32],
        distances: &DMatrix<f64>,
    ) {
        debug_assert_eq!(distances.shape(), (object_ids.len(), hypothesis_ids.len()));
        self.num_frames += 1;

        let mut object_done = vec![false; object_ids.len()];
        let mut hyp_done = vec![false; hypothesis_ids.len()];

        if !object_ids.is_empty() && !hypothesis_ids.is_empty() {
            for (i, &o) in object_ids.iter().enumerate() {
                for (j, &h) in hypothesis_ids.iter().enumerate() {
                    if distances[(i, j)].is_finite() {
                        *self.pair_counts.entry((o, h)).or_insert(0) += 1;
                    }
                }
            }

            // 1. Keep correspondences from the previous update when still valid.
            for (i, &o) in object_ids.iter().enumerate() {
                let tracked_last_update = self.last_update_frame.is_some()
                    && self.last_match.get(&o).copied() == self.last_update_frame;
                if !tracked_last_update {
                    continue;
                }
                let Some(&h_prev) = self.object_to_hyp.get(&o) else {
                    continue;
                };
                let Some(j) = hypothesis_ids
                    .iter()
                    .enumerate()
                    .position(|(j, &h)| !hyp_done[j] && h == h_prev)
                else {
                    continue;
                };
                let d = distances[(i, j)];
                if d.is_finite() {
                    object_done[i] = true;
                    hyp_done[j] = true;
                    self.push(frame_id, EventType::Match, Some(o), Some(h_prev), Some(d));
                    self.last_match.insert(o, frame_id);
                }
            }

            // 2. Optimal assignment over the remaining pairs.
            let mut remaining = distances.clone();
            for (i, done) in object_done.iter().enumerate() {
                if *done {
                    remaining.row_mut(i).fill(f64::NAN);
                }
            }
            for (j, done) in hyp_done.iter().enumerate() {
                if *done {
                    remaining.column_mut(j).fill(f64::NAN);
                }
            }

            let result = linear_sum_assignment(&remaining, f64::INFINITY);
            for a in result.assignments {
                let (i, j) = (a.row_idx, a.col_idx);
                let d = remaining[(i, j)];
                let o = object_ids[i];
                let h = hypothesis_ids[j];

                let is_switch = self.object_to_hyp.get(&o).is_some_and(|&prev| prev != h);
                if is_switch && !self.hyp_history.contains(&h) {
                    self.push(frame_id, EventType::Ascend, Some(o), Some(h), Some(d));
                }

                let is_transfer = self.hyp_to_object.get(&h).is_some_and(|&prev| prev != o);
                if is_transfer {
                    if !self.object_to_hyp.contains_key(&o) {
                        self.push(frame_id, EventType::Migrate, Some(o), Some(h), Some(d));
                    }
                    self.push(frame_id, EventType::Transfer, Some(o), Some(h), Some(d));
                }

                let primary = if is_switch {
                    EventType::Switch
                } else {
                    EventType::Match
                };
                self.push(frame_id, primary, Some(o), Some(h), Some(d));

                object_done[i] = true;
                hyp_done[j] = true;
                self.object_to_hyp.insert(o, h);
                self.hyp_to_object.insert(h, o);
                self.last_match.insert(o, frame_id);
            }
        }

        for (i, &o) in object_ids.iter().enumerate() {
            if !object_done[i] {
                self.push(frame_id, EventType::Miss, Some(o), None, None);
            }
        }
        for (j, &h) in hypothesis_ids.iter().enumerate() {
            if !hyp_done[j] {
                self.push(frame_id, EventType::FalsePositive, None, Some(h), None);
            }
        }

        self.hyp_history.extend(hypothesis_ids.iter().copied());
        self.last_update_frame = Some(frame_id);
    }

    fn push(
        &mut self,
        frame_id: i32,
        event_type: EventType,
        object_id: Option<i32>,
        hypothesis_id: Option<i32>,
        distance: Option<f64>,
    ) {
        self.events.push(Event {
            frame_id,
            event_type,
            object_id,
            hypothesis_id,
            distance,
        });
    }

    /// Compute summary metrics.
    pub fn compute_metrics(&self) -> MOTMetrics {
        let mut metrics = MOTMetrics {
            num_frames: self.num_frames,
            ..MOTMetrics::default()
        };

        // Per-object history of (tracked?) flags in frame order.
        let mut object_history: HashMap<i32, Vec<bool>> = HashMap::new();
        let mut object_frequencies: HashMap<i32, usize> = HashMap::new();
        let mut hyp_frequencies: HashMap<i32, usize> = HashMap::new();

        for event in &self.events {
            match event.event_type {
                EventType::Match => metrics.num_matches += 1,
                EventType::Switch => metrics.num_switches += 1,
                EventType::Transfer => metrics.num_transfer += 1,
                EventType::Ascend => metrics.num_ascend += 1,
                EventType::Migrate => metrics.num_migrate += 1,
                EventType::Miss => metrics.num_misses += 1,
                EventType::FalsePositive => metrics.num_false_positives += 1,
            }

            if !event.event_type.is_primary() {
                continue;
            }
            if event.event_type.is_detection() {
                metrics.total_distance += event.distance.unwrap_or(0.0);
            }
            if let Some(o) = event.object_id {
                *object_frequencies.entry(o).or_insert(0) += 1;
                object_history
                    .entry(o)
                    .or_default()
                    .push(event.event_type.is_detection());
            }
            if let Some(h) = event.hypothesis_id {
                *hyp_frequencies.entry(h).or_insert(0) += 1;
            }
        }

        metrics.num_objects = object_frequencies.values().sum();
        metrics.num_predictions = hyp_frequencies.values().sum();
        metrics.num_unique_objects = object_frequencies.len();

        for history in object_history.values() {
            let tracked = history.iter().filter(|&&t| t).count();
            let ratio = tracked as f64 / history.len() as f64;
            if ratio >= MOSTLY_TRACKED_RATIO {
                metrics.mostly_tracked += 1;
            } else if ratio < MOSTLY_LOST_RATIO {
                metrics.mostly_lost += 1;
            } else {
                metrics.partially_tracked += 1;
            }
            metrics.num_fragmentations += count_fragmentations(history);
        }

        let idtp = self.id_true_positives(&object_frequencies, &hyp_frequencies);
        metrics.idtp = idtp;
        metrics.idfn = metrics.num_objects - idtp;
        metrics.idfp = metrics.num_predictions - idtp;

        metrics
    }

    /// Global one-to-one assignment of object and hypothesis trajectories maximising
    /// the number of frames in which the assigned pairs are matchable.
    fn id_true_positives(
        &self,
        object_frequencies: &HashMap<i32, usize>,
        hyp_frequencies: &HashMap<i32, usize>,
    ) -> usize {
        if self.pair_counts.is_empty() {
            return 0;
        }

        let mut object_ids: Vec<i32> = object_frequencies.keys().copied().collect();
        let mut hyp_ids: Vec<i32> = hyp_frequencies.keys().copied().collect();
        object_ids.sort_unstable();
        hyp_ids.sort_unstable();

        let object_index: HashMap<i32, usize> =
            object_ids.iter().enumerate().map(|(i, &o)| (o, i)).collect();
        let hyp_index: HashMap<i32, usize> =
            hyp_ids.iter().enumerate().map(|(j, &h)| (h, j)).collect();

        let mut costs = DMatrix::zeros(object_ids.len(), hyp_ids.len());
        for (&(o, h), &count) in &self.pair_counts {
            if let (Some(&i), Some(&j)) = (object_index.get(&o), hyp_index.get(&h)) {
                costs[(i, j)] = -(count as f64);
            }
        }

        linear_sum_assignment(&costs, f64::INFINITY)
            .assignments
            .iter()
            .map(|a| (-costs[(a.row_idx, a.col_idx)]) as usize)
            .sum()
    }
}

/// Count tracked -> missed transitions between the first and last tracked frame.
fn count_fragmentations(history: &[bool]) -> usize {
    let (Some(first), Some(last)) = (
        history.iter().position(|&t| t),
        history.iter().rposition(|&t| t),
    ) else {
        return 0;
    };

    history[first..=last]
        .windows(2)
        .filter(|w| w[0] && !w[1])
        .count()
}

/// Raw counts from MOT evaluation, plus ratios derived from them.
///
/// Counts are additive across sequences, so an overall row is obtained by
/// [`MOTMetrics::merge`] followed by the same derived-metric accessors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MOTMetrics {
    pub num_frames: usize,
    /// Object occurrences over all frames
    pub num_objects: usize,
    /// Hypothesis occurrences over all frames
    pub num_predictions: usize,
    pub num_matches: usize,
    pub num_switches: usize,
    pub num_transfer: usize,
    pub num_ascend: usize,
    pub num_migrate: usize,
    pub num_misses: usize,
    pub num_false_positives: usize,
    pub num_fragmentations: usize,
    pub num_unique_objects: usize,
    pub mostly_tracked: usize,
    pub partially_tracked: usize,
    pub mostly_lost: usize,
    pub idtp: usize,
    pub idfp: usize,
    pub idfn: usize,
    /// Sum of match distances, for MOTP
    pub total_distance: f64,
}

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

impl MOTMetrics {
    /// Matches plus switches.
    pub fn num_detections(&self) -> usize {
        self.num_matches + self.num_switches
    }

    pub fn recall(&self) -> f64 {
        ratio(self.num_detections() as f64, self.num_objects as f64)
    }

    pub fn precision(&self) -> f64 {
        ratio(
            self.num_detections() as f64,
            (self.num_detections() + self.num_false_positives) as f64,
        )
    }

    /// MOTA = 1 - (FN + FP + IDSW) / num_objects
    pub fn mota(&self) -> f64 {
        if self.num_objects == 0 {
            return 0.0;
        }
        let errors = self.num_misses + self.num_false_positives + self.num_switches;
        1.0 - errors as f64 / self.num_objects as f64
    }

    /// Mean IoU distance over matched pairs.
    pub fn motp(&self) -> f64 {
        ratio(self.total_distance, self.num_detections() as f64)
    }

    pub fn idp(&self) -> f64 {
        ratio(self.idtp as f64, (self.idtp + self.idfp) as f64)
    }

    pub fn idr(&self) -> f64 {
        ratio(self.idtp as f64, (self.idtp + self.idfn) as f64)
    }

    pub fn idf1(&self) -> f64 {
        ratio(
            2.0 * self.idtp as f64,
            (self.num_objects + self.num_predictions) as f64,
        )
    }

    /// Add the counts of another evaluation into this one.
    pub fn merge(&mut self, other: &MOTMetrics) {
        self.num_frames += other.num_frames;
        self.num_objects += other.num_objects;
        self.num_predictions += other.num_predictions;
        self.num_matches += other.num_matches;
        self.num_switches += other.num_switches;
        self.num_transfer += other.num_transfer;
        self.num_ascend += other.num_ascend;
        self.num_migrate += other.num_migrate;
        self.num_misses += other.num_misses;
        self.num_false_positives += other.num_false_positives;
        self.num_fragmentations += other.num_fragmentations;
        self.num_unique_objects += other.num_unique_objects;
        self.mostly_tracked += other.mostly_tracked;
        self.partially_tracked += other.partially_tracked;
        self.mostly_lost += other.mostly_lost;
        self.idtp += other.idtp;
        self.idfp += other.idfp;
        self.idfn += other.idfn;
        self.total_distance += other.total_distance;
    }
}

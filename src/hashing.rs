//! Combinatorial anchor/target hashing of frame peaks.
//!
//! Every anchor frame `i` is paired with the `fan_out` frames starting
//! `anchor_distance` frames later. Each pair becomes a 30-bit hash made of
//! three 10-bit fields: anchor bin, target bin and frame delta.

use crate::stages::{PeakConsumer, Stage};

const FIELD_BITS: u32 = 10;
const FIELD_MASK: u32 = (1 << FIELD_BITS) - 1;

/// Largest value any hash field can hold.
pub const MAX_FIELD: u32 = FIELD_MASK;

/// A single landmark: the anchor frame and its packed hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint {
    /// Index of the anchor frame.
    pub anchor_time: u32,
    pub hash: u32,
}

/// Packs an anchor bin, a target bin and a frame delta into a hash.
///
/// Each field is truncated to 10 bits.
pub fn pack_hash(anchor_bin: u32, target_bin: u32, delta: u32) -> u32 {
    ((anchor_bin & FIELD_MASK) << (2 * FIELD_BITS)) | ((target_bin & FIELD_MASK) << FIELD_BITS) | (delta & FIELD_MASK)
}

/// Splits a hash back into `(anchor_bin, target_bin, delta)`.
pub fn unpack_hash(hash: u32) -> (u32, u32, u32) {
    (
        (hash >> (2 * FIELD_BITS)) & FIELD_MASK,
        (hash >> FIELD_BITS) & FIELD_MASK,
        hash & FIELD_MASK,
    )
}

/// Number of fingerprints generated from `frames` peaks.
pub fn fingerprint_count(frames: usize, anchor_distance: usize, fan_out: usize) -> usize {
    frames.saturating_sub(anchor_distance + fan_out) * fan_out
}

fn emit_anchor(peaks: &[u16], anchor: usize, anchor_distance: usize, fan_out: usize, output: &mut Vec<Fingerprint>) {
    let anchor_bin = u32::from(peaks[anchor]);
    let zone_start = anchor + anchor_distance;
    for target in zone_start..zone_start + fan_out {
        let delta = (target - anchor) as u32;
        output.push(Fingerprint {
            anchor_time: anchor as u32,
            hash: pack_hash(anchor_bin, u32::from(peaks[target]), delta),
        });
    }
}

/// Generates all fingerprints of a complete peak sequence.
pub fn generate_fingerprints(peaks: &[u16], anchor_distance: usize, fan_out: usize) -> Vec<Fingerprint> {
    let mut fingerprints = Vec::with_capacity(fingerprint_count(peaks.len(), anchor_distance, fan_out));
    let anchors = peaks.len().saturating_sub(anchor_distance + fan_out);
    for anchor in 0..anchors {
        emit_anchor(peaks, anchor, anchor_distance, fan_out, &mut fingerprints);
    }
    fingerprints
}

/// Streaming counterpart of [generate_fingerprints].
///
/// An anchor is emitted once the frame right after its target zone has
/// arrived, so the output always equals the batch function over the peaks
/// consumed so far.
pub struct LandmarkHasher {
    anchor_distance: usize,
    fan_out: usize,
    peaks: Vec<u16>,
    next_anchor: usize,
    fingerprints: Vec<Fingerprint>,
}

impl LandmarkHasher {
    pub(crate) fn new(anchor_distance: usize, fan_out: usize) -> Self {
        Self {
            anchor_distance,
            fan_out,
            peaks: Vec::new(),
            next_anchor: 0,
            fingerprints: Vec::new(),
        }
    }

    pub(crate) fn peaks(&self) -> &[u16] {
        &self.peaks
    }
}

impl Stage for LandmarkHasher {
    type Output = [Fingerprint];

    fn output(&self) -> &Self::Output {
        self.fingerprints.as_slice()
    }
}

impl PeakConsumer for LandmarkHasher {
    fn consume(&mut self, peak: u16) {
        self.peaks.push(peak);
        while self.next_anchor + self.anchor_distance + self.fan_out < self.peaks.len() {
            emit_anchor(&self.peaks, self.next_anchor, self.anchor_distance, self.fan_out, &mut self.fingerprints);
            self.next_anchor += 1;
        }
    }

    fn reset(&mut self) {
        self.peaks.clear();
        self.fingerprints.clear();
        self.next_anchor = 0;
    }
}

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use crate::error::Result;
use crate::hashing::Fingerprint;
use crate::index::{FingerprintIndex, Posting, SongId};

/// Settings of the offset histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOptions {
    bucket_width: u32,
}

impl MatchOptions {
    /// Sets how many consecutive frame offsets share one histogram bucket.
    pub fn with_bucket_width(mut self, bucket_width: u32) -> Self {
        self.bucket_width = bucket_width.max(1);
        self
    }

    pub fn bucket_width(&self) -> u32 {
        self.bucket_width
    }
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self { bucket_width: 1 }
    }
}

/// Strongest time alignment between the query and one song.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alignment {
    pub song_id: SongId,
    /// Number of fingerprints agreeing on the alignment.
    pub score: usize,
    /// First frame offset (stored anchor time minus query anchor time) of the winning bucket.
    pub offset: i64,
}

/// A ranked match, ready for reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub song_id: SongId,
    pub name: String,
    pub score: usize,
    pub offset: i64,
    /// Score relative to the best match; the best match is always 100%.
    pub match_pct: f64,
    /// Share of this score in the sum of all scores.
    pub confidence_pct: f64,
}

/// Collects, per song, the offsets between stored and query anchor times of equal hashes.
pub fn collect_offsets(query: &[Fingerprint], postings: &HashMap<u32, Vec<Posting>>) -> BTreeMap<SongId, Vec<i64>> {
    let mut offsets: BTreeMap<SongId, Vec<i64>> = BTreeMap::new();
    for fingerprint in query {
        let Some(found) = postings.get(&fingerprint.hash) else {
            continue;
        };
        for posting in found {
            offsets
                .entry(posting.song_id)
                .or_default()
                .push(i64::from(posting.anchor_time) - i64::from(fingerprint.anchor_time));
        }
    }
    offsets
}

/// Returns the fullest bucket of an offset histogram as `(first offset, count)`.
///
/// Buckets are `[k * width, (k + 1) * width)`; ties go to the smallest offset.
pub fn strongest_offset(offsets: &[i64], bucket_width: u32) -> Option<(i64, usize)> {
    let width = i64::from(bucket_width.max(1));
    let mut histogram: HashMap<i64, usize> = HashMap::new();
    for offset in offsets {
        *histogram.entry(offset.div_euclid(width)).or_default() += 1;
    }

    histogram
        .into_iter()
        .max_by_key(|&(bucket, count)| (count, Reverse(bucket)))
        .map(|(bucket, count)| (bucket * width, count))
}

/// Scores every song and sorts by score (descending), then song id.
pub fn rank(offsets: &BTreeMap<SongId, Vec<i64>>, options: &MatchOptions) -> Vec<Alignment> {
    let mut alignments = offsets
        .iter()
        .filter_map(|(&song_id, song_offsets)| {
            strongest_offset(song_offsets, options.bucket_width).map(|(offset, score)| Alignment { song_id, score, offset })
        })
        .collect::<Vec<_>>();

    alignments.sort_by_key(|a| (Reverse(a.score), a.song_id));
    alignments
}

/// Finds songs of `index` that contain the query, best first.
///
/// An empty result means no stored fingerprint shares a hash with the query.
pub fn match_fingerprints<I: FingerprintIndex + ?Sized>(
    query: &[Fingerprint],
    index: &I,
    options: &MatchOptions,
) -> Result<Vec<Match>> {
    if query.is_empty() {
        return Ok(Vec::new());
    }

    let hashes = query.iter().map(|f| f.hash).collect::<Vec<_>>();
    let postings = index.lookup_many(&hashes)?;
    log::debug!("{} of {} query hashes found in the index", postings.len(), hashes.len());

    let alignments = rank(&collect_offsets(query, &postings), options);
    let Some(top) = alignments.first() else {
        return Ok(Vec::new());
    };

    let top_score = top.score as f64;
    let total_score = alignments.iter().map(|a| a.score).sum::<usize>() as f64;

    alignments
        .iter()
        .map(|alignment| {
            Ok(Match {
                song_id: alignment.song_id,
                name: index.get_name(alignment.song_id)?,
                score: alignment.score,
                offset: alignment.offset,
                match_pct: alignment.score as f64 / top_score * 100.0,
                confidence_pct: alignment.score as f64 / total_score * 100.0,
            })
        })
        .collect()
}

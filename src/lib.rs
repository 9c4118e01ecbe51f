//! Landmark-based audio fingerprinting and song identification.
//!
//! Recordings are turned into a per-frame dominant frequency, pairs of those
//! peaks are packed into 30-bit hashes, and a sample is matched against a
//! corpus by voting on the time offset between equal hashes.

mod audio;
mod builder;
mod decode;
mod error;
mod fingerprinter;
mod hashing;
mod index;
mod matcher;
mod peaks;
mod query;
mod stages;
mod stft;
mod store;
mod utils;

pub use audio::Waveform;
pub use builder::{build_corpus, list_recordings, song_name, BuildSummary, CorpusBuilder};
pub use decode::{AudioDecoder, SymphoniaDecoder};
pub use error::{Error, Result};
pub use fingerprinter::{
    fingerprint_waveform, Configuration, Fingerprinter, DEFAULT_ANCHOR_DISTANCE, DEFAULT_FAN_OUT,
    DEFAULT_SAMPLE_RATE, DEFAULT_WINDOW_SIZE,
};
pub use hashing::{fingerprint_count, generate_fingerprints, pack_hash, unpack_hash, Fingerprint};
pub use index::{FingerprintIndex, MemoryIndex, Posting, SongId};
pub use matcher::{match_fingerprints, Match, MatchOptions};
pub use query::{identify_file, identify_waveform, query_parameters, ParameterOverrides, QueryReport};
pub use stft::frame_count;
pub use store::SqliteStore;

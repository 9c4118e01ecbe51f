use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use crate::fingerprinter::Configuration;
use crate::index::SongId;

/// Errors reported by fingerprinting, indexing and matching.
#[derive(Debug)]
pub enum Error {
    /// A decoded waveform contained no samples.
    EmptyWaveform,
    /// An audio file could not be decoded.
    Decode { path: PathBuf, reason: String },
    /// Corpus parameters are out of range.
    InvalidParameters(&'static str),
    /// The corpus was built with different parameters than the ones requested.
    ParameterMismatch { stored: Configuration, requested: Configuration },
    /// The corpus does not contain stored parameters.
    MissingParameters,
    /// No song with this id exists in the index.
    UnknownSong(SongId),
    /// A song with this name is already indexed.
    DuplicateSong(String),
    /// Resampling to the corpus sample rate failed.
    Resample(String),
    Storage(rusqlite::Error),
    Io(std::io::Error),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::EmptyWaveform => write!(f, "Waveform contains no samples"),
            Error::Decode { path, reason } => write!(f, "Cannot decode {}: {}", path.display(), reason),
            Error::InvalidParameters(reason) => write!(f, "Invalid corpus parameters: {reason}"),
            Error::ParameterMismatch { stored, requested } => write!(
                f,
                "Corpus was built with {stored} but {requested} was requested"
            ),
            Error::MissingParameters => write!(f, "Corpus has no stored parameters"),
            Error::UnknownSong(id) => write!(f, "Song #{id} does not exist"),
            Error::DuplicateSong(name) => write!(f, "Song {name:?} is already indexed"),
            Error::Resample(reason) => write!(f, "Cannot resample: {reason}"),
            Error::Storage(e) => write!(f, "Storage error: {e}"),
            Error::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Storage(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Storage(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

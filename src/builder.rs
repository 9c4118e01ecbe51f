use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::audio::Waveform;
use crate::decode::AudioDecoder;
use crate::error::{Error, Result};
use crate::fingerprinter::{fingerprint_waveform, Configuration};
use crate::index::{FingerprintIndex, SongId};

/// File extensions picked up when scanning a dataset directory.
pub const SUPPORTED_EXTENSIONS: [&str; 2] = ["wav", "mp3"];

/// Outcome of adding a dataset to a corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    /// Songs added in this run, in the order they were indexed.
    pub added: Vec<(SongId, String)>,
    /// Names already present in the corpus.
    pub skipped: Vec<String>,
    /// Fingerprints written in this run.
    pub fingerprints: usize,
    pub elapsed: Duration,
}

/// Lists the recordings of a dataset directory, sorted by file name.
///
/// Only regular files with a supported extension (case-insensitive) are returned.
/// Subdirectories are not descended into.
pub fn list_recordings(dataset: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dataset)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        if is_supported(&path) {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| SUPPORTED_EXTENSIONS.iter().any(|s| s.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Name a recording is stored under: its file name without the extension.
pub fn song_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Fingerprints recordings and appends them to an index.
pub struct CorpusBuilder<'a, D: AudioDecoder + ?Sized, I: FingerprintIndex + ?Sized> {
    config: Configuration,
    decoder: &'a D,
    index: &'a mut I,
}

impl<'a, D: AudioDecoder + ?Sized, I: FingerprintIndex + ?Sized> CorpusBuilder<'a, D, I> {
    /// Creates a builder, recording `config` as the corpus parameters.
    ///
    /// Fails when the index already holds a corpus built with other parameters.
    pub fn new(config: &Configuration, decoder: &'a D, index: &'a mut I) -> Result<Self> {
        index.store_parameters(config)?;
        Ok(Self { config: *config, decoder, index })
    }

    /// Indexes one waveform under `name`.
    ///
    /// Returns `None` when a song with this name is already indexed.
    pub fn add_waveform(&mut self, name: &str, waveform: &Waveform) -> Result<Option<(SongId, usize)>> {
        if self.index.song_by_name(name)?.is_some() {
            log::info!("Skipping {name}: already indexed");
            return Ok(None);
        }
        if waveform.is_empty() {
            return Err(Error::EmptyWaveform);
        }

        let fingerprints = fingerprint_waveform(waveform, &self.config)?;
        let song_id = self.index.add_song_with_fingerprints(name, &fingerprints)?;
        log::debug!("Indexed {name} as #{song_id} with {} fingerprints", fingerprints.len());
        Ok(Some((song_id, fingerprints.len())))
    }

    /// Decodes and indexes one recording.
    pub fn add_file(&mut self, path: &Path) -> Result<Option<(SongId, usize)>> {
        let name = song_name(path);
        if self.index.song_by_name(&name)?.is_some() {
            log::info!("Skipping {name}: already indexed");
            return Ok(None);
        }

        let waveform = self.decoder.decode(path)?;
        self.add_waveform(&name, &waveform)
    }

    /// Indexes every supported recording of `dataset`.
    pub fn add_directory(&mut self, dataset: &Path) -> Result<BuildSummary> {
        let started = Instant::now();
        let paths = list_recordings(dataset)?;
        log::info!("Found {} recordings in {}", paths.len(), dataset.display());

        let mut summary = BuildSummary {
            added: Vec::new(),
            skipped: Vec::new(),
            fingerprints: 0,
            elapsed: Duration::ZERO,
        };

        for (i, path) in paths.iter().enumerate() {
            let name = song_name(path);
            log::info!("[{}/{}] {}", i + 1, paths.len(), name);
            match self.add_file(path)? {
                Some((song_id, count)) => {
                    summary.added.push((song_id, name));
                    summary.fingerprints += count;
                }
                None => summary.skipped.push(name),
            }
        }

        summary.elapsed = started.elapsed();
        Ok(summary)
    }
}

/// Builds (or extends) a corpus from every recording in `dataset`.
pub fn build_corpus<D, I>(dataset: &Path, decoder: &D, index: &mut I, config: &Configuration) -> Result<BuildSummary>
where
    D: AudioDecoder + ?Sized,
    I: FingerprintIndex + ?Sized,
{
    CorpusBuilder::new(config, decoder, index)?.add_directory(dataset)
}

use std::path::Path;
use std::time::{Duration, Instant};

use crate::audio::Waveform;
use crate::decode::AudioDecoder;
use crate::error::{Error, Result};
use crate::fingerprinter::{fingerprint_waveform, Configuration};
use crate::index::FingerprintIndex;
use crate::matcher::{match_fingerprints, Match, MatchOptions};

/// Corpus parameters a caller asked for explicitly.
///
/// Unset fields take the stored value; set fields must agree with it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ParameterOverrides {
    pub sample_rate: Option<u32>,
    pub window_size: Option<usize>,
    pub anchor_distance: Option<usize>,
    pub fan_out: Option<usize>,
}

impl ParameterOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Returns `base` with every explicitly requested field replaced.
    pub fn apply(&self, base: &Configuration) -> Configuration {
        let mut config = *base;
        if let Some(sample_rate) = self.sample_rate {
            config = config.with_sample_rate(sample_rate);
        }
        if let Some(window_size) = self.window_size {
            config = config.with_window_size(window_size);
        }
        if let Some(anchor_distance) = self.anchor_distance {
            config = config.with_anchor_distance(anchor_distance);
        }
        if let Some(fan_out) = self.fan_out {
            config = config.with_fan_out(fan_out);
        }
        config
    }
}

/// Result of identifying one sample.
#[derive(Debug, Clone)]
pub struct QueryReport {
    /// Ranked matches, best first. Empty when nothing matched.
    pub matches: Vec<Match>,
    /// Number of fingerprints extracted from the sample.
    pub fingerprints: usize,
    pub elapsed: Duration,
}

impl QueryReport {
    pub fn best(&self) -> Option<&Match> {
        self.matches.first()
    }
}

/// Resolves the parameters a query runs with.
pub fn query_parameters<I: FingerprintIndex + ?Sized>(index: &I, overrides: &ParameterOverrides) -> Result<Configuration> {
    let stored = index.parameters()?.ok_or(Error::MissingParameters)?;
    stored.ensure_compatible(&overrides.apply(&stored))?;
    Ok(stored)
}

/// Identifies an already decoded sample against `index`.
pub fn identify_waveform<I: FingerprintIndex + ?Sized>(
    waveform: &Waveform,
    index: &I,
    overrides: &ParameterOverrides,
    options: &MatchOptions,
) -> Result<QueryReport> {
    let started = Instant::now();
    let config = query_parameters(index, overrides)?;
    if waveform.is_empty() {
        return Err(Error::EmptyWaveform);
    }

    let fingerprints = fingerprint_waveform(waveform, &config)?;
    let matches = match_fingerprints(&fingerprints, index, options)?;
    Ok(QueryReport {
        matches,
        fingerprints: fingerprints.len(),
        elapsed: started.elapsed(),
    })
}

/// Decodes `path` and identifies it against `index`.
pub fn identify_file<D, I>(
    path: &Path,
    decoder: &D,
    index: &I,
    overrides: &ParameterOverrides,
    options: &MatchOptions,
) -> Result<QueryReport>
where
    D: AudioDecoder + ?Sized,
    I: FingerprintIndex + ?Sized,
{
    let started = Instant::now();
    // Fail on the corpus before spending time on decoding.
    query_parameters(index, overrides)?;
    let waveform = decoder.decode(path)?;
    let mut report = identify_waveform(&waveform, index, overrides, options)?;
    report.elapsed = started.elapsed();
    Ok(report)
}

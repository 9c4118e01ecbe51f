use std::fmt::{Display, Formatter};

use crate::audio::Waveform;
use crate::error::{Error, Result};
use crate::hashing::{Fingerprint, LandmarkHasher, MAX_FIELD};
use crate::peaks::PeakPicker;
use crate::stages::{AudioConsumer, Stage};
use crate::stft::Stft;

/// Parameters a corpus is built with.
///
/// Hashes are only comparable between fingerprints calculated with equal
/// configurations, so a corpus stores the one it was built with and every
/// query must reuse it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Configuration {
    sample_rate: u32,
    window_size: usize,
    anchor_distance: usize,
    fan_out: usize,
}

impl Configuration {
    /// Sets the sample rate audio is resampled to before fingerprinting.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Sets number of samples in a single STFT frame.
    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    /// Sets distance (in frames) from an anchor to the start of its target zone.
    pub fn with_anchor_distance(mut self, anchor_distance: usize) -> Self {
        self.anchor_distance = anchor_distance;
        self
    }

    /// Sets number of frames in a target zone.
    pub fn with_fan_out(mut self, fan_out: usize) -> Self {
        self.fan_out = fan_out;
        self
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn anchor_distance(&self) -> usize {
        self.anchor_distance
    }

    pub fn fan_out(&self) -> usize {
        self.fan_out
    }

    /// Duration of a single STFT hop, i.e. of one unit of anchor time.
    pub fn frame_duration_in_seconds(&self) -> f32 {
        crate::stft::hop_size(self.window_size) as f32 / self.sample_rate as f32
    }

    /// Checks that the parameters produce well-formed hashes.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::InvalidParameters("sample rate must be positive"));
        }
        if self.window_size < 2 || self.window_size % 2 != 0 {
            return Err(Error::InvalidParameters("window size must be an even number of at least 2"));
        }
        if self.fan_out == 0 {
            return Err(Error::InvalidParameters("fan out must be at least 1"));
        }
        let span = self.anchor_distance.checked_add(self.fan_out - 1);
        if !matches!(span, Some(span) if span <= MAX_FIELD as usize) {
            return Err(Error::InvalidParameters("anchor distance + fan out must not exceed 1024 frames"));
        }
        Ok(())
    }

    /// Fails unless `requested` equals these (stored) parameters.
    pub fn ensure_compatible(&self, requested: &Configuration) -> Result<()> {
        if self != requested {
            return Err(Error::ParameterMismatch { stored: *self, requested: *requested });
        }
        Ok(())
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            window_size: DEFAULT_WINDOW_SIZE,
            anchor_distance: DEFAULT_ANCHOR_DISTANCE,
            fan_out: DEFAULT_FAN_OUT,
        }
    }
}

impl Display for Configuration {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "sample rate {} Hz, window size {}, anchor distance {}, fan out {}",
            self.sample_rate, self.window_size, self.anchor_distance, self.fan_out
        )
    }
}

pub const DEFAULT_SAMPLE_RATE: u32 = 22050;
pub const DEFAULT_WINDOW_SIZE: usize = 4096;
pub const DEFAULT_ANCHOR_DISTANCE: usize = 5;
pub const DEFAULT_FAN_OUT: usize = 10;

/// Calculates landmark fingerprints for mono audio at the configured sample rate.
pub struct Fingerprinter {
    config: Configuration,
    stft: Stft<PeakPicker<LandmarkHasher>>,
}

impl Fingerprinter {
    /// Creates a new [Fingerprinter] with the given [Configuration].
    pub fn new(config: &Configuration) -> Result<Self> {
        config.validate()?;
        let hasher = LandmarkHasher::new(config.anchor_distance, config.fan_out);
        let picker = PeakPicker::new(config.sample_rate, config.window_size, hasher);
        let stft = Stft::new(config.window_size, picker);
        Ok(Self { config: *config, stft })
    }

    /// Resets the internal state to allow for a new fingerprint calculation.
    pub fn start(&mut self) {
        self.stft.reset();
    }

    /// Adds a new chunk of samples to the current calculation.
    pub fn consume(&mut self, data: &[f32]) {
        self.stft.consume(data);
    }

    /// Finishes the calculation, dropping samples that do not fill a frame.
    pub fn finish(&mut self) {
        self.stft.flush();
    }

    /// Returns fingerprints of the audio consumed since the last [Fingerprinter::start].
    pub fn fingerprints(&self) -> &[Fingerprint] {
        self.stft.output()
    }

    /// Returns the quantized peak of every frame consumed so far.
    pub fn peaks(&self) -> &[u16] {
        self.stft.consumer().consumer().peaks()
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }
}

/// Fingerprints a whole waveform, resampling it to the configured rate first.
pub fn fingerprint_waveform(waveform: &Waveform, config: &Configuration) -> Result<Vec<Fingerprint>> {
    let mut printer = Fingerprinter::new(config)?;
    let resampled;
    let waveform = if waveform.sample_rate() == config.sample_rate() {
        waveform
    } else {
        resampled = waveform.resample(config.sample_rate())?;
        &resampled
    };

    printer.start();
    printer.consume(waveform.samples());
    printer.finish();
    log::debug!(
        "{} frames, {} fingerprints from {:.2} s of audio",
        printer.peaks().len(),
        printer.fingerprints().len(),
        waveform.duration_in_seconds()
    );
    Ok(printer.fingerprints().to_vec())
}

#[cfg(test)]
mod tests {
    use crate::audio::Waveform;
    use crate::error::Error;
    use crate::fingerprinter::{fingerprint_waveform, Configuration, Fingerprinter};
    use crate::hashing::{fingerprint_count, generate_fingerprints, unpack_hash};
    use crate::peaks::MAX_BIN;
    use crate::stft::frame_count;

    fn tone(freq: f32, sample_rate: u32, samples: usize) -> Vec<f32> {
        (0..samples)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    fn melody(sample_rate: u32, seconds: f32) -> Vec<f32> {
        let samples = (seconds * sample_rate as f32) as usize;
        let note = sample_rate as usize / 8;
        (0..samples)
            .map(|i| {
                let freq = 220.0 + 110.0 * ((i / note) % 7) as f32;
                (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin()
            })
            .collect()
    }

    #[test]
    fn defaults() {
        let config = Configuration::default();
        assert_eq!(22050, config.sample_rate());
        assert_eq!(4096, config.window_size());
        assert_eq!(5, config.anchor_distance());
        assert_eq!(10, config.fan_out());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validation() {
        let config = Configuration::default();
        assert!(config.with_sample_rate(0).validate().is_err());
        assert!(config.with_window_size(0).validate().is_err());
        assert!(config.with_window_size(4095).validate().is_err());
        assert!(config.with_fan_out(0).validate().is_err());
        assert!(config.with_anchor_distance(1014).with_fan_out(10).validate().is_ok());
        assert!(config.with_anchor_distance(1015).with_fan_out(10).validate().is_err());
        assert!(matches!(
            config.with_anchor_distance(usize::MAX).validate(),
            Err(Error::InvalidParameters(_))
        ));
        assert!(config.with_fan_out(usize::MAX).validate().is_err());
        assert!(matches!(Fingerprinter::new(&config.with_fan_out(0)), Err(Error::InvalidParameters(_))));
    }

    #[test]
    fn compatibility() {
        let stored = Configuration::default();
        assert!(stored.ensure_compatible(&Configuration::default()).is_ok());
        let requested = stored.with_fan_out(3);
        match stored.ensure_compatible(&requested) {
            Err(Error::ParameterMismatch { stored: s, requested: r }) => {
                assert_eq!(stored, s);
                assert_eq!(requested, r);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn scenario_counts() {
        let config = Configuration::default();
        let waveform = Waveform::new(melody(22050, 5.0), 22050);
        let mut printer = Fingerprinter::new(&config).unwrap();
        printer.consume(waveform.samples());
        printer.finish();

        assert_eq!(52, frame_count(waveform.samples().len(), 4096));
        assert_eq!(52, printer.peaks().len());
        assert_eq!(370, fingerprint_count(52, 5, 10));
        assert_eq!(370, printer.fingerprints().len());
        assert_eq!(generate_fingerprints(printer.peaks(), 5, 10), printer.fingerprints());
    }

    #[test]
    fn deterministic() {
        let config = Configuration::default();
        let waveform = Waveform::new(melody(22050, 3.0), 22050);
        let first = fingerprint_waveform(&waveform, &config).unwrap();
        let second = fingerprint_waveform(&waveform, &config).unwrap();
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn chunking_does_not_matter() {
        let config = Configuration::default();
        let samples = melody(22050, 2.0);

        let mut whole = Fingerprinter::new(&config).unwrap();
        whole.consume(&samples);
        whole.finish();

        let mut chunked = Fingerprinter::new(&config).unwrap();
        for chunk in samples.chunks(1000) {
            chunked.consume(chunk);
        }
        chunked.finish();

        assert_eq!(whole.fingerprints(), chunked.fingerprints());
    }

    #[test]
    fn pure_tone_peak() {
        let config = Configuration::default();
        let mut printer = Fingerprinter::new(&config).unwrap();
        printer.consume(&tone(1000.0, 22050, 22050));
        printer.finish();

        assert!(!printer.peaks().is_empty());
        for &peak in printer.peaks() {
            // The closest FFT bin to 1000 Hz is 186 * 22050 / 4096 = 1001.3 Hz.
            assert_eq!(100, peak);
        }
        for fingerprint in printer.fingerprints() {
            let (anchor, target, delta) = unpack_hash(fingerprint.hash);
            assert_eq!((100, 100), (anchor, target));
            assert!((5..15).contains(&delta));
        }
    }

    #[test]
    fn high_frequencies_clamp() {
        let config = Configuration::default().with_sample_rate(44100).with_window_size(1024);
        let mut printer = Fingerprinter::new(&config).unwrap();
        printer.consume(&tone(15000.0, 44100, 8192));
        printer.finish();

        assert!(!printer.peaks().is_empty());
        assert!(printer.peaks().iter().all(|&p| p == MAX_BIN));
    }

    #[test]
    fn short_waveform_has_no_fingerprints() {
        let config = Configuration::default();
        let waveform = Waveform::new(vec![0.1; 4095], 22050);
        assert!(fingerprint_waveform(&waveform, &config).unwrap().is_empty());
    }

    #[test]
    fn restart_clears_state() {
        let config = Configuration::default();
        let mut printer = Fingerprinter::new(&config).unwrap();
        printer.consume(&melody(22050, 3.0));
        printer.finish();
        assert!(!printer.peaks().is_empty());
        assert!(!printer.fingerprints().is_empty());

        printer.start();
        assert!(printer.fingerprints().is_empty());
        assert!(printer.peaks().is_empty());
    }
}

use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};

use crate::error::{Error, Result};

const RESAMPLER_CHUNK_SIZE: usize = 1024;

/// Mono audio samples at a fixed sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    /// Down-mixes interleaved frames of `channels` samples by averaging them.
    pub fn from_interleaved(interleaved: &[f32], channels: usize, sample_rate: u32) -> Self {
        let samples = match channels {
            0 | 1 => interleaved.to_vec(),
            _ => interleaved
                .chunks_exact(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                .collect(),
        };
        Self { samples, sample_rate }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_in_seconds(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Returns the waveform converted to `target_rate` with a sinc resampler.
    ///
    /// The output is aligned with the input and has
    /// `round(len * target_rate / sample_rate)` samples.
    pub fn resample(&self, target_rate: u32) -> Result<Waveform> {
        if self.sample_rate == 0 || target_rate == 0 {
            return Err(Error::Resample(format!("cannot convert {} Hz to {} Hz", self.sample_rate, target_rate)));
        }
        if self.sample_rate == target_rate || self.samples.is_empty() {
            return Ok(Waveform::new(self.samples.clone(), target_rate));
        }

        let ratio = f64::from(target_rate) / f64::from(self.sample_rate);
        let params = SincInterpolationParameters {
            sinc_len: 128,
            f_cutoff: 0.95,
            oversampling_factor: 128,
            interpolation: SincInterpolationType::Linear,
            window: WindowFunction::BlackmanHarris2,
        };
        let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, RESAMPLER_CHUNK_SIZE, 1)
            .map_err(|e| Error::Resample(e.to_string()))?;

        // `SincFixedIn` starts half a sinc before the first input sample, so the
        // output is already aligned and nothing is trimmed from the front.
        let expected_len = (self.samples.len() as f64 * ratio).round() as usize;
        let mut output = Vec::with_capacity(expected_len + RESAMPLER_CHUNK_SIZE);

        for chunk in self.samples.chunks(RESAMPLER_CHUNK_SIZE) {
            let processed = match chunk.len() {
                RESAMPLER_CHUNK_SIZE => resampler.process(&[chunk], None),
                _ => resampler.process_partial(Some(&[chunk]), None),
            };
            let processed = processed.map_err(|e| Error::Resample(e.to_string()))?;
            output.extend_from_slice(&processed[0]);
        }

        // Push silence through until the tail has come out.
        while output.len() < expected_len {
            let processed = resampler
                .process_partial::<&[f32]>(None, None)
                .map_err(|e| Error::Resample(e.to_string()))?;
            if processed[0].is_empty() {
                break;
            }
            output.extend_from_slice(&processed[0]);
        }

        output.resize(expected_len, 0.0);
        log::debug!(
            "Resampled {} samples at {} Hz to {} samples at {} Hz",
            self.samples.len(),
            self.sample_rate,
            output.len(),
            target_rate
        );
        Ok(Waveform::new(output, target_rate))
    }
}

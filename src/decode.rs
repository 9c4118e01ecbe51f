use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::audio::Waveform;
use crate::error::{Error, Result};

/// Turns an audio file into a mono waveform at its native sample rate.
pub trait AudioDecoder {
    fn decode(&self, path: &Path) -> Result<Waveform>;
}

/// Decodes every container and codec known to symphonia.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoder;

fn decode_error(path: &Path, reason: impl ToString) -> Error {
    Error::Decode { path: path.to_path_buf(), reason: reason.to_string() }
}

impl AudioDecoder for SymphoniaDecoder {
    fn decode(&self, path: &Path) -> Result<Waveform> {
        let src = File::open(path).map_err(|e| decode_error(path, e))?;
        let mss = MediaSourceStream::new(Box::new(src), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| decode_error(path, format!("unsupported format ({e})")))?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| decode_error(path, "no supported audio tracks"))?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| decode_error(path, format!("unsupported codec ({e})")))?;

        let track_id = track.id;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| decode_error(path, "missing sample rate"))?;
        let mut channels = track.codec_params.channels.map(|c| c.count());

        let mut interleaved = Vec::new();
        let mut sample_buf = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(decode_error(path, e)),
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(audio_buf) => {
                    if sample_buf.is_none() {
                        let spec = *audio_buf.spec();
                        channels = Some(spec.channels.count());
                        sample_buf = Some(SampleBuffer::<f32>::new(audio_buf.capacity() as u64, spec));
                    }

                    if let Some(buf) = &mut sample_buf {
                        buf.copy_interleaved_ref(audio_buf);
                        interleaved.extend_from_slice(buf.samples());
                    }
                }
                Err(SymphoniaError::DecodeError(e)) => log::warn!("Skipping corrupt packet in {}: {}", path.display(), e),
                Err(e) => return Err(decode_error(path, e)),
            }
        }

        let channels = channels.unwrap_or(1);
        let waveform = Waveform::from_interleaved(&interleaved, channels, sample_rate);
        log::debug!(
            "Decoded {}: {} Hz, {} channel(s), {:.2} s",
            path.display(),
            sample_rate,
            channels,
            waveform.duration_in_seconds()
        );
        Ok(waveform)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use crate::decode::{AudioDecoder, SymphoniaDecoder};
    use crate::error::Error;

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = SymphoniaDecoder.decode(&dir.path().join("missing.wav"));
        assert!(matches!(result, Err(Error::Decode { .. })));
    }

    #[test]
    fn garbage_file() {
        let mut file = tempfile::Builder::new().suffix(".mp3").tempfile().unwrap();
        file.write_all(&[0x42; 512]).unwrap();
        let result = SymphoniaDecoder.decode(file.path());
        assert!(matches!(result, Err(Error::Decode { .. })));
    }

    #[test]
    fn pcm_wav() {
        let sample_rate = 8000u32;
        let frames: Vec<[i16; 2]> = (0..800).map(|i| [(i * 10) as i16, -(i * 10) as i16]).collect();

        let mut bytes = Vec::new();
        let data_len = (frames.len() * 4) as u32;
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&(sample_rate * 4).to_le_bytes());
        bytes.extend_from_slice(&4u16.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        for [l, r] in &frames {
            bytes.extend_from_slice(&l.to_le_bytes());
            bytes.extend_from_slice(&r.to_le_bytes());
        }

        let mut file = tempfile::Builder::new().suffix(".wav").tempfile().unwrap();
        file.write_all(&bytes).unwrap();
        file.flush().unwrap();

        let waveform = SymphoniaDecoder.decode(file.path()).unwrap();
        assert_eq!(sample_rate, waveform.sample_rate());
        assert_eq!(frames.len(), waveform.samples().len());
        // Opposite channels cancel out when down-mixed.
        assert!(waveform.samples().iter().all(|s| s.abs() < 1e-6));
    }
}

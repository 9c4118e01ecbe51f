use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;

use rusty_audiosearch::{AudioDecoder, SymphoniaDecoder, Waveform};

/// Cut an excerpt of an audio file and add Gaussian noise, to be used as a query sample.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Audio file to cut the excerpt from
    file: PathBuf,

    /// Start of the excerpt in seconds
    start: f64,

    /// Duration of the excerpt in seconds
    duration: f64,

    /// Standard deviation of the added noise, relative to the peak (0 disables noise)
    noise_ratio: f64,

    /// Seed for the noise generator
    #[arg(long)]
    seed: Option<u64>,

    /// Where to write the sample [default: next to the input]
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// Scales samples so that the largest absolute value becomes 1.0.
fn normalize_peak(samples: &mut [f32]) {
    let peak = samples.iter().fold(0.0f32, |peak, s| peak.max(s.abs()));
    if peak > 0.0 {
        samples.iter_mut().for_each(|s| *s /= peak);
    }
}

/// Returns the samples in `[start, start + duration)` seconds.
fn clip(samples: &[f32], sample_rate: u32, start: f64, duration: f64) -> anyhow::Result<&[f32]> {
    if start < 0.0 || duration <= 0.0 {
        bail!("start must not be negative and duration must be positive");
    }
    let start_idx = (start * f64::from(sample_rate)) as usize;
    let end_idx = (((start + duration) * f64::from(sample_rate)) as usize).min(samples.len());
    if start_idx >= end_idx {
        bail!(
            "excerpt starts after the end of the recording ({:.2} s)",
            samples.len() as f64 / f64::from(sample_rate)
        );
    }
    Ok(&samples[start_idx..end_idx])
}

/// Adds zero-mean Gaussian noise with standard deviation `ratio`.
fn add_noise(samples: &mut [f32], ratio: f64, rng: &mut impl Rng) -> anyhow::Result<()> {
    if ratio == 0.0 {
        return Ok(());
    }
    let normal = Normal::new(0.0, ratio).context("invalid noise ratio")?;
    for s in samples {
        *s += rng.sample(normal) as f32;
    }
    Ok(())
}

fn output_path(input: &Path, start: f64, duration: f64, ratio: f64) -> PathBuf {
    let stem = input.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    input.with_file_name(format!("{}_{:.0}-{:.0}_{}.wav", stem, start, start + duration, ratio))
}

fn write_wav(path: &Path, waveform: &Waveform) -> anyhow::Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: waveform.sample_rate(),
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec).context("creating output file")?;
    for &sample in waveform.samples() {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if args.noise_ratio < 0.0 {
        bail!("noise ratio must not be negative");
    }

    let decoded = SymphoniaDecoder
        .decode(&args.file)
        .with_context(|| format!("loading {}", args.file.display()))?;

    let mut samples = decoded.samples().to_vec();
    normalize_peak(&mut samples);
    let mut excerpt = clip(&samples, decoded.sample_rate(), args.start, args.duration)?.to_vec();

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    add_noise(&mut excerpt, args.noise_ratio, &mut rng)?;

    let output = args
        .output
        .unwrap_or_else(|| output_path(&args.file, args.start, args.duration, args.noise_ratio));
    let sample = Waveform::new(excerpt, decoded.sample_rate());
    write_wav(&output, &sample).with_context(|| format!("writing {}", output.display()))?;

    log::info!("Wrote {:.2} s to {}", sample.duration_in_seconds(), output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::{add_noise, clip, normalize_peak, output_path};

    #[test]
    fn peak_is_one() {
        let mut samples = vec![0.1, -0.5, 0.25];
        normalize_peak(&mut samples);
        assert_eq!(vec![0.2, -1.0, 0.5], samples);

        let mut silence = vec![0.0; 4];
        normalize_peak(&mut silence);
        assert_eq!(vec![0.0; 4], silence);
    }

    #[test]
    fn clipping() {
        let samples = (0..100).map(|i| i as f32).collect::<Vec<_>>();
        assert_eq!(&samples[20..50], clip(&samples, 10, 2.0, 3.0).unwrap());
        // Runs up to the end of the recording at most.
        assert_eq!(&samples[80..], clip(&samples, 10, 8.0, 5.0).unwrap());
        assert!(clip(&samples, 10, 10.0, 1.0).is_err());
        assert!(clip(&samples, 10, -1.0, 1.0).is_err());
        assert!(clip(&samples, 10, 1.0, 0.0).is_err());
    }

    #[test]
    fn noise_statistics() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut draws = vec![0.0f32; 20000];
        add_noise(&mut draws, 0.5, &mut rng).unwrap();
        let draws = draws.iter().map(|&x| f64::from(x)).collect::<Vec<_>>();
        let mean = draws.iter().sum::<f64>() / draws.len() as f64;
        let variance = draws.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / draws.len() as f64;
        assert!(mean.abs() < 0.02, "mean {mean}");
        assert!((variance.sqrt() - 0.5).abs() < 0.02, "std dev {}", variance.sqrt());
    }

    #[test]
    fn zero_ratio_adds_nothing() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut samples = vec![0.5; 16];
        add_noise(&mut samples, 0.0, &mut rng).unwrap();
        assert_eq!(vec![0.5; 16], samples);

        add_noise(&mut samples, 0.1, &mut rng).unwrap();
        assert_ne!(vec![0.5; 16], samples);
        assert!(add_noise(&mut samples, -0.1, &mut rng).is_err());
    }

    #[test]
    fn default_output_name() {
        assert_eq!(
            Path::new("/music/song_30-35_0.1.wav"),
            output_path(Path::new("/music/song.mp3"), 30.0, 5.0, 0.1)
        );
        assert_eq!(Path::new("a_1-3_0.wav"), output_path(Path::new("a.wav"), 1.2, 2.0, 0.0));
    }
}

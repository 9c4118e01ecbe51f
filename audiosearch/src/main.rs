use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{ArgAction, Parser, ValueEnum};

use rusty_audiosearch::{
    build_corpus, identify_file, Configuration, FingerprintIndex, MatchOptions, ParameterOverrides, QueryReport,
    SqliteStore, SymphoniaDecoder, DEFAULT_ANCHOR_DISTANCE, DEFAULT_FAN_OUT, DEFAULT_SAMPLE_RATE,
    DEFAULT_WINDOW_SIZE,
};

use crate::utils::ElapsedExt;

mod utils;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Fingerprint a dataset into the database
    Build,
    /// Identify a sample against the database
    Query,
}

/// Build a fingerprint database from a dataset of songs, or identify a sample against it.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// What to do
    #[arg(long, value_enum, default_value_t = Mode::Query)]
    mode: Mode,

    /// Filename of the fingerprint database
    #[arg(long)]
    db: Option<PathBuf>,

    /// Directory with the songs to fingerprint (build mode)
    #[arg(long)]
    dataset: Option<PathBuf>,

    /// Audio sample to identify (query mode)
    #[arg(long)]
    sample: Option<PathBuf>,

    /// Sample rate fingerprints are computed at [build default: 22050]
    #[arg(long)]
    sr: Option<u32>,

    /// STFT window size in samples [build default: 4096]
    #[arg(long)]
    win_size: Option<usize>,

    /// Frames between an anchor and its first target [build default: 5]
    #[arg(long)]
    anchor_dist: Option<usize>,

    /// Targets paired with every anchor [build default: 10]
    #[arg(long)]
    fan_out: Option<usize>,

    /// Number of results to print
    #[arg(long, default_value_t = 10)]
    top: usize,

    /// Frame offsets sharing one histogram bucket
    #[arg(long, default_value_t = 1)]
    bucket_width: u32,

    /// Print more details (repeat for even more)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn overrides(&self) -> ParameterOverrides {
        ParameterOverrides {
            sample_rate: self.sr,
            window_size: self.win_size,
            anchor_distance: self.anchor_dist,
            fan_out: self.fan_out,
        }
    }

    fn build_configuration(&self) -> Configuration {
        Configuration::default()
            .with_sample_rate(self.sr.unwrap_or(DEFAULT_SAMPLE_RATE))
            .with_window_size(self.win_size.unwrap_or(DEFAULT_WINDOW_SIZE))
            .with_anchor_distance(self.anchor_dist.unwrap_or(DEFAULT_ANCHOR_DISTANCE))
            .with_fan_out(self.fan_out.unwrap_or(DEFAULT_FAN_OUT))
    }
}

fn build(db: &Path, dataset: &Path, config: &Configuration, out: &mut impl Write) -> anyhow::Result<()> {
    let mut store = SqliteStore::open(db).with_context(|| format!("opening database {}", db.display()))?;
    let summary = build_corpus(dataset, &SymphoniaDecoder, &mut store, config)
        .with_context(|| format!("building database from {}", dataset.display()))?;

    for (song_id, name) in &summary.added {
        writeln!(out, "{song_id} {name}")?;
    }
    if !summary.skipped.is_empty() {
        writeln!(out, "Skipped {} song(s) already in the database", summary.skipped.len())?;
    }
    writeln!(
        out,
        "Time spent on loading and fingerprinting {} song(s): {}",
        summary.added.len(),
        summary.elapsed.display_elapsed()
    )?;
    log::info!("{} fingerprints written to {}", summary.fingerprints, db.display());
    Ok(())
}

fn query(
    db: &Path,
    sample: &Path,
    overrides: &ParameterOverrides,
    options: &MatchOptions,
    top: usize,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let store = SqliteStore::open_existing(db).with_context(|| format!("opening database {}", db.display()))?;
    log::info!(
        "Database has {} song(s) and {} fingerprints",
        store.song_count()?,
        store.fingerprint_count()?
    );
    let frame_duration = match store.parameters()? {
        Some(config) => {
            log::debug!("Stored parameters: {config}");
            config.frame_duration_in_seconds()
        }
        None => 0.0,
    };

    let report = identify_file(sample, &SymphoniaDecoder, &store, overrides, options)
        .with_context(|| format!("identifying {}", sample.display()))?;
    log::info!("{} fingerprints extracted from the sample", report.fingerprints);
    for m in report.matches.iter().take(top) {
        log::debug!("{} aligns at {:.2} s", m.name, m.offset as f32 * frame_duration);
    }

    writeln!(out, "{}", sample.display())?;
    write_report(&report, top, out)?;
    Ok(())
}

fn write_report(report: &QueryReport, top: usize, out: &mut impl Write) -> std::io::Result<()> {
    if report.matches.is_empty() {
        writeln!(out, "No match.")?;
    } else {
        writeln!(out, "Top {top} results:")?;
        for (i, m) in report.matches.iter().take(top).enumerate() {
            writeln!(
                out,
                "{:2}. {}: {:.2}%, score = {} ({:.2}%)",
                i + 1,
                m.name,
                m.match_pct,
                m.score,
                m.confidence_pct
            )?;
        }
    }
    writeln!(out, "Time spent on fingerprinting and query: {}", report.elapsed.display_elapsed())
}

fn run(args: &Args, out: &mut impl Write) -> anyhow::Result<()> {
    let Some(db) = &args.db else {
        bail!("Filename of database not parsed.");
    };

    match args.mode {
        Mode::Build => {
            let Some(dataset) = &args.dataset else {
                bail!("Path of dataset not parsed.");
            };
            build(db, dataset, &args.build_configuration(), out)
        }
        Mode::Query => {
            let Some(sample) = &args.sample else {
                bail!("Filename of sample audio not parsed.");
            };
            if !db.is_file() {
                bail!("Database file does not exist.");
            }
            let options = MatchOptions::default().with_bucket_width(args.bucket_width);
            query(db, sample, &args.overrides(), &options, args.top, out)
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let stdout = std::io::stdout();
    run(&args, &mut stdout.lock())
}

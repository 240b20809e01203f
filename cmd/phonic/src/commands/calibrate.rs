//! Calibrate a letter from a recording.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::Args;

use phonic_audio::{PushSource, wav};
use phonic_phoneme::{Letter, ProfileId, SNAPSHOTS_NEEDED};

use super::{TICK, build_engine, describe, tick_samples};
use crate::Cli;

/// Add a positive snapshot for every peak found in a WAV file.
///
/// Each peak's clip (300 ms before, 700 ms after) is stored alongside
/// the snapshot.
#[derive(Args)]
pub struct CalibrateCommand {
    /// Letter to calibrate
    #[arg(long)]
    letter: Letter,

    /// Profile the snapshots belong to
    #[arg(long)]
    profile: String,

    /// Stop after this many snapshots
    #[arg(long, default_value_t = SNAPSHOTS_NEEDED)]
    max: usize,

    /// WAV file to read
    file: PathBuf,
}

impl CalibrateCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let profile = ProfileId::new(self.profile.clone())?;
        let (format, samples) =
            wav::read_file(&self.file).with_context(|| format!("read {}", self.file.display()))?;
        let source = PushSource::new(format);
        let mut engine = build_engine(cli, source.clone())?;
        engine.load_exemplars().await?;
        engine.start_calibration(self.letter, profile).await?;

        // Accept a take only after its clip has had time to fill, so the
        // next peak does not find the capture busy.
        let post_ticks = engine.config().capture.post_onset_ms as u128 / TICK.as_millis().max(1) + 1;
        let chunk = tick_samples(format.sample_rate);
        let start = Instant::now();
        let mut peak_at: Option<usize> = None;
        let mut added = 0usize;

        for (i, block) in samples.chunks(chunk).enumerate() {
            if added >= self.max {
                break;
            }
            source.feed(block);
            let at = TICK * i as u32;
            let outcome = engine.tick_at(start + at);
            if let Some(line) = describe(at, &outcome) {
                println!("{line}");
            }
            if outcome.peak.is_some() {
                peak_at = Some(i);
            }
            tokio::task::yield_now().await;

            if peak_at.is_some_and(|p| (i - p) as u128 >= post_ticks) {
                peak_at = None;
                if let Some(id) = engine.accept_calibration(start + at)? {
                    added += 1;
                    println!("{:>8.3}s added snapshot {id}", at.as_secs_f64());
                }
            }
        }
        if peak_at.is_some() && added < self.max {
            let end = start + TICK * samples.len().div_ceil(chunk) as u32;
            if let Some(id) = engine.accept_calibration(end)? {
                added += 1;
                println!("added snapshot {id} (clip cut short)");
            }
        }

        engine.stop_session().await?;
        let total = engine.store().snapshots(self.letter).iter().filter(|s| !s.is_negative).count();
        println!(
            "{}: added {added}, {total} positive snapshot(s) stored ({SNAPSHOTS_NEEDED} suggested)",
            self.letter
        );
        Ok(())
    }
}

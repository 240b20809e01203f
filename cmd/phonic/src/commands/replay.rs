//! Replay a recording through a detection session.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::Args;

use phonic_audio::{PushSource, wav};
use phonic_phoneme::{Decision, Letter};

use super::{TICK, build_engine, describe, tick_samples};
use crate::Cli;

/// Run a WAV file through a detection session for one letter.
///
/// Prints every onset with its match decision. Accepted matches reinforce
/// the winning snapshot, as in a live session.
#[derive(Args)]
pub struct ReplayCommand {
    /// Target letter
    #[arg(long)]
    letter: Letter,

    /// WAV file to replay
    file: PathBuf,
}

impl ReplayCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let (format, samples) =
            wav::read_file(&self.file).with_context(|| format!("read {}", self.file.display()))?;
        let source = PushSource::new(format);
        let mut engine = build_engine(cli, source.clone())?;

        let loaded = engine.load_exemplars().await?;
        tracing::info!(snapshots = loaded, "replay: exemplars loaded");
        engine.start_session(self.letter).await?;

        let chunk = tick_samples(format.sample_rate);
        let start = Instant::now();
        let (mut accepted, mut rejected, mut outranked) = (0usize, 0usize, 0usize);

        for (i, block) in samples.chunks(chunk).enumerate() {
            source.feed(block);
            let at = TICK * i as u32;
            let outcome = engine.tick_at(start + at);
            if let Some(line) = describe(at, &outcome) {
                println!("{line}");
            }
            match outcome.matched.map(|m| m.decision) {
                Some(Decision::Accepted) => accepted += 1,
                Some(Decision::Rejected) => rejected += 1,
                Some(Decision::Outranked(_)) => outranked += 1,
                _ => {}
            }
            // Let clip recorders and the writer catch up.
            tokio::task::yield_now().await;
        }

        engine.stop_session().await?;
        println!(
            "{}: {accepted} accepted, {rejected} rejected, {outranked} outranked over {:.2}s",
            self.letter,
            format.duration(samples.len()).as_secs_f64()
        );
        Ok(())
    }
}

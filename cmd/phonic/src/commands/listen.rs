//! Live microphone session.

use std::time::Instant;

use clap::Args;

use phonic_audio::MicSource;
use phonic_phoneme::Letter;

use super::{TICK, build_engine, describe};
use crate::Cli;

/// Listen on the default microphone for one letter until Ctrl-C.
#[derive(Args)]
pub struct ListenCommand {
    /// Target letter
    #[arg(long)]
    letter: Letter,
}

impl ListenCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let source = MicSource::open_default()?;
        let mut engine = build_engine(cli, source)?;
        engine.load_exemplars().await?;
        engine.start_session(self.letter).await?;
        tracing::info!(letter = %self.letter, "listen: press Ctrl-C to stop");

        let start = Instant::now();
        let mut ticker = tokio::time::interval(TICK);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = Instant::now();
                    let outcome = engine.tick_at(now);
                    if let Some(line) = describe(now - start, &outcome) {
                        println!("{line}");
                    }
                }
                _ = tokio::signal::ctrl_c() => break,
            }
        }

        engine.stop_session().await?;
        Ok(())
    }
}

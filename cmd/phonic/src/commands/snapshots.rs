//! Snapshot inspection commands.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, bail};
use clap::{Args, Subcommand};

use phonic_audio::{Format, PushSource};
use phonic_phoneme::{ExemplarRepository, KvClipStore, KvRepository, Letter, SnapshotRecord};

use super::{engine_over, open_store};
use crate::Cli;

/// Inspect and delete stored snapshots.
///
/// Indexes are positions within a letter as printed by `list`.
#[derive(Args)]
pub struct SnapshotsCommand {
    #[command(subcommand)]
    command: SnapshotsSubcommand,
}

#[derive(Subcommand)]
enum SnapshotsSubcommand {
    /// List snapshots
    List {
        /// Only this letter
        #[arg(long)]
        letter: Option<Letter>,
    },
    /// Delete one snapshot
    Remove {
        #[arg(long)]
        letter: Letter,
        #[arg(long)]
        index: usize,
    },
    /// Write a snapshot's clip to a WAV file
    Clip {
        #[arg(long)]
        letter: Letter,
        #[arg(long)]
        index: usize,
        /// Output file
        #[arg(short = 'o', long)]
        output: PathBuf,
    },
}

impl SnapshotsCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        match &self.command {
            SnapshotsSubcommand::List { letter } => self.list(cli, *letter).await,
            SnapshotsSubcommand::Remove { letter, index } => self.remove(cli, *letter, *index).await,
            SnapshotsSubcommand::Clip {
                letter,
                index,
                output,
            } => self.clip(cli, *letter, *index, output).await,
        }
    }

    async fn list(&self, cli: &Cli, letter: Option<Letter>) -> anyhow::Result<()> {
        let repository = KvRepository::new(open_store(cli)?);
        let letters = match letter {
            Some(l) => vec![(l, repository.load_letter(l).await?)],
            None => repository.load_all().await?.into_iter().collect(),
        };

        let mut total = 0;
        for (letter, records) in &letters {
            for (i, rec) in records.iter().enumerate() {
                println!("{letter} {i:>3} {}", describe(rec));
            }
            total += records.len();
        }
        println!("{total} snapshot(s) in {} letter(s)", letters.len());
        Ok(())
    }

    async fn remove(&self, cli: &Cli, letter: Letter, index: usize) -> anyhow::Result<()> {
        let store = open_store(cli)?;
        let mut engine = engine_over(cli, store.clone(), PushSource::new(Format::MONO_16K))?;
        engine.load_exemplars().await?;

        let Some(id) = engine.store().snapshots(letter).get(index).map(|s| s.id) else {
            bail!("{letter} has no snapshot {index}");
        };
        let removed = engine.remove_snapshot(id, Instant::now())?;
        engine.flush().await?;
        if let Some(uri) = &removed.audio_ref {
            if let Err(e) = KvClipStore::new(store).remove(uri) {
                tracing::warn!(%uri, "snapshots: clip not removed: {e}");
            }
        }
        println!(
            "removed {letter} {index} ({}, score {})",
            kind(removed.is_negative, removed.is_global_negative),
            removed.score
        );
        Ok(())
    }

    async fn clip(&self, cli: &Cli, letter: Letter, index: usize, output: &PathBuf) -> anyhow::Result<()> {
        let store = open_store(cli)?;
        let records = KvRepository::new(store.clone()).load_letter(letter).await?;
        let Some(rec) = records.get(index) else {
            bail!("{letter} has no snapshot {index}");
        };
        let Some(uri) = &rec.audio_url else {
            bail!("{letter} {index} has no clip");
        };
        let wav = KvClipStore::new(Arc::clone(&store))
            .fetch(uri)?
            .with_context(|| format!("clip {uri} not found"))?;
        std::fs::write(output, &wav).with_context(|| format!("write {}", output.display()))?;
        println!("wrote {} ({} bytes)", output.display(), wav.len());
        Ok(())
    }
}

fn kind(negative: bool, global: bool) -> &'static str {
    match (negative, global) {
        (_, true) => "global-negative",
        (true, false) => "negative",
        (false, false) => "positive",
    }
}

fn describe(rec: &SnapshotRecord) -> String {
    let created = rec
        .created_at
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".into());
    format!(
        "{:<15} score={:<4} profile={} created={created} clip={}",
        kind(rec.is_negative, rec.is_global_negative),
        rec.score,
        rec.profile_id,
        rec.audio_url.as_deref().unwrap_or("-"),
    )
}

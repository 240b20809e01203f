//! Shared helpers for commands.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use phonic_audio::AudioSource;
use phonic_kv::{RedbStore, SharedKVStore};
use phonic_phoneme::{
    Engine, EngineConfig, KvClipStore, KvRepository, MatchInfo, Onset, TickOutcome,
};

use crate::Cli;

/// Host tick interval.
pub(crate) const TICK: Duration = Duration::from_micros(16_667);

const DEFAULT_DIR: &str = ".phonic";
const DEFAULT_DB: &str = "phonic.redb";

pub(crate) fn db_path(cli: &Cli) -> anyhow::Result<PathBuf> {
    if let Some(path) = &cli.db {
        return Ok(path.clone());
    }
    let home = dirs::home_dir().context("could not find home directory")?;
    let dir = home.join(DEFAULT_DIR);
    std::fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir.join(DEFAULT_DB))
}

pub(crate) fn open_store(cli: &Cli) -> anyhow::Result<SharedKVStore> {
    let path = db_path(cli)?;
    let store = RedbStore::open(&path).with_context(|| format!("open {}", path.display()))?;
    Ok(Arc::new(store))
}

pub(crate) fn load_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    match &cli.config {
        Some(path) => Ok(EngineConfig::load(path)?),
        None => Ok(EngineConfig::default()),
    }
}

/// An engine over the CLI database with clip uploads enabled.
pub(crate) fn build_engine(cli: &Cli, source: impl AudioSource + 'static) -> anyhow::Result<Engine> {
    engine_over(cli, open_store(cli)?, source)
}

/// Like [`build_engine`] over an already open store.
pub(crate) fn engine_over(
    cli: &Cli,
    store: SharedKVStore,
    source: impl AudioSource + 'static,
) -> anyhow::Result<Engine> {
    let config = load_config(cli)?;
    let repository = Arc::new(KvRepository::new(store.clone()));
    let engine = Engine::new(config, source, repository)?
        .with_uploader(Arc::new(KvClipStore::new(store)));
    Ok(engine)
}

/// Samples per tick at `sample_rate`.
pub(crate) fn tick_samples(sample_rate: u32) -> usize {
    ((sample_rate as f64 * TICK.as_secs_f64()).round() as usize).max(1)
}

fn describe_onset(onset: &Onset) -> String {
    format!("vol={:.1} conc={:.2}", onset.volume, onset.concentration)
}

fn describe_match(info: &MatchInfo) -> String {
    format!(
        "{} target={} pos={:.1} neg={:.1}",
        info.decision, info.target, info.positive_score, info.negative_score
    )
}

/// One line per tick that produced something, or `None`.
pub(crate) fn describe(at: Duration, outcome: &TickOutcome) -> Option<String> {
    let t = at.as_secs_f64();
    if let Some(peak) = &outcome.peak {
        return Some(format!("{t:>8.3}s peak {}", describe_onset(peak)));
    }
    let onset = outcome.onset.as_ref()?;
    let mut line = format!("{t:>8.3}s onset {}", describe_onset(onset));
    if let Some(info) = &outcome.matched {
        line.push(' ');
        line.push_str(&describe_match(info));
    }
    if let Some(prediction) = &outcome.prediction {
        match prediction.predicted {
            Some(letter) => line.push_str(&format!(" sounds-like={letter} ({:.1})", prediction.score)),
            None => line.push_str(" sounds-like=?"),
        }
    }
    Some(line)
}

//! Background write-back of letter records.
//!
//! The detection loop never awaits persistence: [`WriteBack::submit`] hands
//! a letter's records to a writer task and returns. Failed writes come back
//! through [`WriteBack::take_failures`] so the owner can reschedule them.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::error::PhonemeError;
use crate::letter::Letter;
use crate::repository::ExemplarRepository;
use crate::snapshot::SnapshotRecord;

enum Command {
    Save {
        letter: Letter,
        records: Vec<SnapshotRecord>,
    },
    Barrier(oneshot::Sender<()>),
}

/// A write that did not reach the repository.
#[derive(Debug)]
pub struct WriteFailure {
    pub letter: Letter,
    pub error: PhonemeError,
}

/// Handle to the writer task. Dropping it stops the task once queued
/// writes are done.
pub struct WriteBack {
    tx: mpsc::UnboundedSender<Command>,
    failures: mpsc::UnboundedReceiver<WriteFailure>,
}

impl WriteBack {
    /// Spawns the writer on the current tokio runtime.
    pub fn spawn(repository: Arc<dyn ExemplarRepository>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Command>();
        let (fail_tx, failures) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(cmd) = rx.recv().await {
                match cmd {
                    Command::Save { letter, records } => {
                        match repository.save_letter(letter, &records).await {
                            Ok(()) => {
                                tracing::debug!(%letter, snapshots = records.len(), "persist: saved");
                            }
                            Err(error) => {
                                tracing::warn!(%letter, "persist: write failed: {error}");
                                let _ = fail_tx.send(WriteFailure { letter, error });
                            }
                        }
                    }
                    Command::Barrier(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });

        Self { tx, failures }
    }

    /// Queues a write. Never blocks.
    pub fn submit(&self, letter: Letter, records: Vec<SnapshotRecord>) {
        if self.tx.send(Command::Save { letter, records }).is_err() {
            tracing::error!(%letter, "persist: writer task is gone");
        }
    }

    /// Resolves once every write submitted before it has been attempted.
    pub async fn barrier(&self) -> Result<(), PhonemeError> {
        let (done, wait) = oneshot::channel();
        self.tx
            .send(Command::Barrier(done))
            .map_err(|_| PhonemeError::Persistence("writer task is gone".into()))?;
        wait.await
            .map_err(|_| PhonemeError::Persistence("writer task is gone".into()))
    }

    /// Failures reported since the last call.
    pub fn take_failures(&mut self) -> Vec<WriteFailure> {
        let mut out = Vec::new();
        while let Ok(f) = self.failures.try_recv() {
            out.push(f);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::repository::KvRepository;
    use phonic_kv::{KVStore, MemoryStore};

    struct FlakyRepo {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ExemplarRepository for FlakyRepo {
        async fn load_all(&self) -> Result<BTreeMap<Letter, Vec<SnapshotRecord>>, PhonemeError> {
            Ok(BTreeMap::new())
        }

        async fn load_letter(&self, _: Letter) -> Result<Vec<SnapshotRecord>, PhonemeError> {
            Ok(Vec::new())
        }

        async fn save_letter(&self, letter: Letter, _: &[SnapshotRecord]) -> Result<(), PhonemeError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(PhonemeError::PersistenceWriteFailed {
                    letter,
                    message: "offline".into(),
                });
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn barrier_waits_for_queued_writes() {
        let kv = MemoryStore::new();
        let wb = WriteBack::spawn(Arc::new(KvRepository::from_store(kv.clone())));
        let m = Letter::new('m').unwrap();
        wb.submit(m, Vec::new());
        wb.submit(m, Vec::new());
        wb.barrier().await.unwrap();
        assert_eq!(kv.write_count(), 2);
        assert!(kv.get("calibration/m").unwrap().is_some());
    }

    #[tokio::test]
    async fn failures_are_reported_back() {
        let mut wb = WriteBack::spawn(Arc::new(FlakyRepo {
            calls: AtomicUsize::new(0),
        }));
        let s = Letter::new('s').unwrap();
        wb.submit(s, Vec::new());
        wb.submit(s, Vec::new());
        wb.barrier().await.unwrap();

        let failures = wb.take_failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].letter, s);
        assert!(wb.take_failures().is_empty());
    }
}

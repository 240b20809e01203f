//! The pooled, per-letter snapshot collection.

use std::collections::BTreeMap;

use chrono::Utc;

use crate::error::PhonemeError;
use crate::features::{FEATURE_BINS, FeatureVector};
use crate::letter::{Letter, ProfileId};
use crate::snapshot::{Snapshot, SnapshotId, SnapshotKind, SnapshotRecord};

/// Letter → snapshots, pooled across profiles.
///
/// A letter exists once it has been calibrated or loaded, even with no
/// snapshots. Mutations are immediate; persisting them is the caller's job.
pub struct ExemplarStore {
    bins: usize,
    letters: BTreeMap<Letter, Vec<Snapshot>>,
    next_id: u64,
}

impl Default for ExemplarStore {
    fn default() -> Self {
        Self::new(FEATURE_BINS)
    }
}

impl ExemplarStore {
    pub fn new(bins: usize) -> Self {
        Self {
            bins,
            letters: BTreeMap::new(),
            next_id: 1,
        }
    }

    fn alloc_id(&mut self) -> SnapshotId {
        let id = SnapshotId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Makes `letter` known. Returns true if it was new.
    pub fn calibrate_letter(&mut self, letter: Letter) -> bool {
        if self.letters.contains_key(&letter) {
            return false;
        }
        self.letters.insert(letter, Vec::new());
        true
    }

    pub fn contains(&self, letter: Letter) -> bool {
        self.letters.contains_key(&letter)
    }

    /// True if `letter` has at least one positive snapshot.
    pub fn is_calibrated(&self, letter: Letter) -> bool {
        self.snapshots(letter).iter().any(|s| !s.is_negative)
    }

    pub fn letters(&self) -> impl Iterator<Item = Letter> + '_ {
        self.letters.keys().copied()
    }

    pub fn snapshots(&self, letter: Letter) -> &[Snapshot] {
        self.letters.get(&letter).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get(&self, id: SnapshotId) -> Option<&Snapshot> {
        self.letters.values().flatten().find(|s| s.id == id)
    }

    /// Total number of snapshots.
    pub fn len(&self) -> usize {
        self.letters.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Everything relevant when matching `target`: its own snapshots plus
    /// global negatives stored under other letters.
    pub fn candidates(&self, target: Letter) -> impl Iterator<Item = &Snapshot> {
        let own = self.snapshots(target).iter();
        let global = self
            .letters
            .iter()
            .filter(move |(letter, _)| **letter != target)
            .flat_map(|(_, snaps)| snaps.iter())
            .filter(|s| s.is_global_negative);
        own.chain(global)
    }

    pub fn add_positive(
        &mut self,
        letter: Letter,
        pattern: &FeatureVector,
        owner: ProfileId,
        audio_ref: Option<String>,
    ) -> Result<SnapshotId, PhonemeError> {
        self.add(letter, SnapshotKind::Positive, pattern, owner, audio_ref)
    }

    pub fn add_negative(
        &mut self,
        letter: Letter,
        pattern: &FeatureVector,
        owner: ProfileId,
        audio_ref: Option<String>,
    ) -> Result<SnapshotId, PhonemeError> {
        self.add(letter, SnapshotKind::Negative, pattern, owner, audio_ref)
    }

    /// Adds a negative that applies to every target letter.
    pub fn add_global_negative(
        &mut self,
        letter: Letter,
        pattern: &FeatureVector,
        owner: ProfileId,
        audio_ref: Option<String>,
    ) -> Result<SnapshotId, PhonemeError> {
        self.add(letter, SnapshotKind::GlobalNegative, pattern, owner, audio_ref)
    }

    /// Inserts a snapshot, normalizing the pattern to max 1.
    ///
    /// Re-adding an identical capture (same owner, pattern and audio
    /// reference) returns the existing id and changes nothing.
    pub fn add(
        &mut self,
        letter: Letter,
        kind: SnapshotKind,
        pattern: &FeatureVector,
        owner: ProfileId,
        audio_ref: Option<String>,
    ) -> Result<SnapshotId, PhonemeError> {
        if pattern.is_empty() || pattern.is_silent() {
            return Err(PhonemeError::EmptyPattern);
        }
        if !self.letters.contains_key(&letter) {
            return Err(PhonemeError::NoSuchLetter(letter));
        }

        let pattern = pattern.to_normalized();
        let audio_ref = audio_ref.filter(|u| !u.is_empty());
        if let Some(existing) = self
            .snapshots(letter)
            .iter()
            .find(|s| s.same_capture(&owner, &pattern, audio_ref.as_deref()))
        {
            return Ok(existing.id);
        }

        let id = self.alloc_id();
        let snapshot = Snapshot {
            id,
            label: letter,
            pattern,
            is_negative: kind.is_negative(),
            is_global_negative: kind == SnapshotKind::GlobalNegative,
            score: kind.initial_score(),
            audio_ref,
            owner,
            created_at: Utc::now(),
        };
        if let Some(snaps) = self.letters.get_mut(&letter) {
            snaps.push(snapshot);
        }
        Ok(id)
    }

    /// Deletes a snapshot. The letter itself stays.
    pub fn remove(&mut self, id: SnapshotId) -> Result<Snapshot, PhonemeError> {
        for snaps in self.letters.values_mut() {
            if let Some(pos) = snaps.iter().position(|s| s.id == id) {
                return Ok(snaps.remove(pos));
            }
        }
        Err(PhonemeError::NoSuchSnapshot(id))
    }

    /// Sets the clip of a stored snapshot. Returns its letter, or `None`
    /// when the snapshot is gone.
    pub fn attach_audio(&mut self, id: SnapshotId, audio_ref: String) -> Option<Letter> {
        self.letters
            .values_mut()
            .flatten()
            .find(|s| s.id == id)
            .map(|s| {
                s.audio_ref = Some(audio_ref);
                s.label
            })
    }

    /// Bumps a snapshot's score. Returns its letter and new score.
    pub fn reinforce(&mut self, id: SnapshotId) -> Option<(Letter, u32)> {
        self.letters
            .values_mut()
            .flatten()
            .find(|s| s.id == id)
            .map(|s| {
                s.score = s.score.saturating_add(1);
                (s.label, s.score)
            })
    }

    /// Replaces the whole store with loaded records.
    ///
    /// Invalid records are logged and skipped. Returns the number of
    /// snapshots kept.
    pub fn replace_all(&mut self, records: BTreeMap<Letter, Vec<SnapshotRecord>>) -> usize {
        self.letters.clear();
        records
            .into_iter()
            .map(|(letter, recs)| self.replace_letter(letter, recs))
            .sum()
    }

    /// Replaces one letter's snapshots with loaded records.
    pub fn replace_letter(&mut self, letter: Letter, records: Vec<SnapshotRecord>) -> usize {
        let mut snaps: Vec<Snapshot> = Vec::with_capacity(records.len());
        for record in records {
            let id = self.alloc_id();
            match record.into_snapshot(id, letter, self.bins) {
                Ok(snap) => {
                    if snaps
                        .iter()
                        .any(|s| s.same_capture(&snap.owner, &snap.pattern, snap.audio_ref.as_deref()))
                    {
                        tracing::debug!(%letter, "exemplar: dropping duplicate snapshot");
                        continue;
                    }
                    snaps.push(snap);
                }
                Err(e) => tracing::warn!(%letter, "exemplar: skipping record: {e}"),
            }
        }
        let kept = snaps.len();
        self.letters.insert(letter, snaps);
        kept
    }

    /// The persisted form of one letter.
    pub fn records(&self, letter: Letter) -> Vec<SnapshotRecord> {
        self.snapshots(letter).iter().map(Snapshot::to_record).collect()
    }
}

//! The session engine.
//!
//! [`Engine`] owns every piece of detection state for one session: the
//! audio source connection, the analyser, the pattern buffer, the onset
//! detector, the exemplar store and the write scheduler. The host drives it
//! by calling [`Engine::tick`] about 60 times a second; everything that
//! would block (persistence writes, clip recording, uploads) happens on
//! background tasks and is folded back in on the next tick.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use phonic_audio::{Analyser, AudioSource, CaptureError, CaptureHandle, Clip, InputTap, OnsetCapture};

use crate::calibrate::{Calibrator, SNAPSHOTS_NEEDED};
use crate::config::EngineConfig;
use crate::error::PhonemeError;
use crate::exemplar::ExemplarStore;
use crate::features::{FeatureExtractor, FeatureVector, Features};
use crate::letter::{Letter, ProfileId};
use crate::matcher::{Decision, MatchInfo, MatchResult, Matcher};
use crate::onset::{Onset, OnsetDetector};
use crate::pattern::PatternBuffer;
use crate::persist::WriteBack;
use crate::repository::ExemplarRepository;
use crate::scheduler::Debouncer;
use crate::snapshot::{Snapshot, SnapshotId, SnapshotKind, SnapshotRecord};
use crate::upload::{ClipMeta, ClipUploader};

/// Ticks between diagnostic log lines.
const LOG_EVERY: u64 = 60;

enum Mode {
    Idle,
    Game(Letter),
    Calibrating(Calibrator),
}

/// Audio for a snapshot that was stored before its clip was ready.
enum PendingClip {
    Ready(Clip),
    Recording(CaptureHandle),
}

/// Result of a background clip upload.
struct Attachment {
    id: SnapshotId,
    letter: Letter,
    audio_ref: Option<String>,
}

/// What one tick produced.
#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    /// The match trigger that fired, if any.
    pub onset: Option<Onset>,
    pub matched: Option<MatchInfo>,
    pub prediction: Option<MatchResult>,
    pub accepted: bool,
    /// Calibration peak, if one was taken.
    pub peak: Option<Onset>,
}

/// Observable engine state for a UI binding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineState {
    pub is_active: bool,
    pub is_muted: bool,
    pub volume: f32,
    pub concentration: f32,
    pub current_pattern: Option<FeatureVector>,
    pub current_letter: Option<Letter>,
}

pub struct Engine {
    config: EngineConfig,
    extractor: FeatureExtractor,
    analyser: Analyser,
    pattern: PatternBuffer,
    onset: OnsetDetector,
    matcher: Matcher,
    store: ExemplarStore,
    writes: Debouncer<Letter, Vec<SnapshotRecord>>,
    writer: WriteBack,
    repository: Arc<dyn ExemplarRepository>,
    uploader: Option<Arc<dyn ClipUploader>>,
    source: Box<dyn AudioSource>,
    capture: OnsetCapture,
    tap: InputTap,
    window: Vec<f32>,
    spectrum: Vec<u8>,
    mode: Mode,
    muted: bool,
    last: Option<Features>,
    clips_tx: mpsc::UnboundedSender<Clip>,
    clips_rx: mpsc::UnboundedReceiver<Clip>,
    attach_tx: mpsc::UnboundedSender<Attachment>,
    attach_rx: mpsc::UnboundedReceiver<Attachment>,
    uploads_in_flight: usize,
    last_clip: Option<Clip>,
    ticks: u64,
}

impl Engine {
    /// Builds an idle engine. Must be called inside a tokio runtime: the
    /// persistence writer is spawned here.
    pub fn new(
        config: EngineConfig,
        source: impl AudioSource + 'static,
        repository: Arc<dyn ExemplarRepository>,
    ) -> Result<Self, PhonemeError> {
        config.validate()?;

        let capture = OnsetCapture::new(source.format(), config.capture_config());
        let analyser = Analyser::new(config.analyser_config());
        let tap = InputTap::new(analyser.fft_size(), capture.clone());
        let window = vec![0.0; analyser.fft_size()];
        let spectrum = vec![0; analyser.bin_count()];
        let (clips_tx, clips_rx) = mpsc::unbounded_channel();
        let (attach_tx, attach_rx) = mpsc::unbounded_channel();

        Ok(Self {
            extractor: FeatureExtractor::new(config.features.bins),
            pattern: PatternBuffer::new(config.pattern.length),
            onset: OnsetDetector::new(config.onset.clone()),
            matcher: Matcher::new(config.matcher.clone()),
            store: ExemplarStore::new(config.features.bins),
            writes: Debouncer::new(config.debounce()),
            writer: WriteBack::spawn(repository.clone()),
            repository,
            uploader: None,
            source: Box::new(source),
            capture,
            tap,
            window,
            spectrum,
            analyser,
            mode: Mode::Idle,
            muted: false,
            last: None,
            clips_tx,
            clips_rx,
            attach_tx,
            attach_rx,
            uploads_in_flight: 0,
            last_clip: None,
            ticks: 0,
            config,
        })
    }

    /// Uploads clips of confirmed, rejected and calibrated snapshots.
    pub fn with_uploader(mut self, uploader: Arc<dyn ClipUploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &ExemplarStore {
        &self.store
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.mode, Mode::Idle)
    }

    pub fn current_letter(&self) -> Option<Letter> {
        match &self.mode {
            Mode::Idle => None,
            Mode::Game(letter) => Some(*letter),
            Mode::Calibrating(cal) => Some(cal.letter()),
        }
    }

    pub fn state(&self) -> EngineState {
        EngineState {
            is_active: self.is_active(),
            is_muted: self.muted,
            volume: self.last.as_ref().map_or(0.0, |f| f.volume),
            concentration: self.last.as_ref().map_or(0.0, |f| f.concentration),
            current_pattern: self.last.as_ref().map(|f| f.pattern.clone()),
            current_letter: self.current_letter(),
        }
    }

    /// Suspends match evaluation. The microphone stays open.
    pub fn set_muted(&mut self, muted: bool) {
        if self.muted != muted {
            tracing::info!(muted, "engine: mute changed");
        }
        self.muted = muted;
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// The most recent clip recorded on a match trigger.
    pub fn last_clip(&self) -> Option<&Clip> {
        self.last_clip.as_ref()
    }

    /// Number of letters waiting on the debounce timer.
    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    /// Clips still being recorded or uploaded for stored snapshots.
    pub fn pending_uploads(&self) -> usize {
        self.uploads_in_flight
    }

    /// Replaces the store with everything persisted.
    ///
    /// Outstanding clips and pending writes are settled first so the load
    /// cannot read back stale records.
    pub async fn load_exemplars(&mut self) -> Result<usize, PhonemeError> {
        self.settle().await;
        self.flush().await?;
        let records = self.repository.load_all().await?;
        let letters = records.len();
        let loaded = self.store.replace_all(records);
        tracing::info!(letters, snapshots = loaded, "engine: exemplars loaded");
        Ok(loaded)
    }

    /// Refreshes one letter from persistence.
    pub async fn reload_letter(&mut self, letter: Letter) -> Result<usize, PhonemeError> {
        self.settle().await;
        self.flush().await?;
        let records = self.repository.load_letter(letter).await?;
        Ok(self.store.replace_letter(letter, records))
    }

    /// Makes `letter` known to the store so snapshots can be added to it.
    pub fn calibrate_letter(&mut self, letter: Letter) -> bool {
        self.store.calibrate_letter(letter)
    }

    /// Starts detecting `letter`.
    ///
    /// Fails with [`PhonemeError::NoCalibration`] when the letter has no
    /// positive snapshot, and with [`PhonemeError::PermissionDenied`] when
    /// the microphone is refused. Either way the engine stays idle.
    pub async fn start_session(&mut self, letter: Letter) -> Result<(), PhonemeError> {
        if !self.store.is_calibrated(letter) {
            return Err(PhonemeError::NoCalibration(letter));
        }
        if let Err(e) = self.flush().await {
            tracing::warn!(%letter, "engine: flush before session failed: {e}");
        }
        self.open_input()?;
        self.onset.reset();
        self.mode = Mode::Game(letter);
        tracing::info!(%letter, "engine: session started");
        Ok(())
    }

    /// Stops detection, releases the microphone and flushes pending writes.
    ///
    /// Clips still recording for stored snapshots are finished first, so
    /// this can take up to one capture length.
    pub async fn stop_session(&mut self) -> Result<(), PhonemeError> {
        if let Some(letter) = self.current_letter() {
            tracing::info!(%letter, "engine: session stopped");
        }
        self.mode = Mode::Idle;
        self.settle().await;
        self.close_input();
        self.flush().await
    }

    fn open_input(&mut self) -> Result<(), PhonemeError> {
        if self.source.is_connected() {
            self.source.disconnect();
        }
        self.tap.clear();
        self.capture.start_buffering();
        if let Err(e) = self.source.connect(self.tap.clone()) {
            self.capture.stop_buffering();
            tracing::warn!("engine: audio source unavailable: {e}");
            return Err(e.into());
        }
        self.pattern.clear();
        self.analyser.reset();
        self.last = None;
        self.last_clip = None;
        self.ticks = 0;
        Ok(())
    }

    fn close_input(&mut self) {
        self.source.disconnect();
        self.capture.stop_buffering();
        self.tap.clear();
        self.pattern.clear();
        self.last = None;
    }

    pub fn tick(&mut self) -> TickOutcome {
        self.tick_at(Instant::now())
    }

    /// Analyses the latest audio window and processes it.
    pub fn tick_at(&mut self, now: Instant) -> TickOutcome {
        if !self.is_active() {
            self.background(now);
            return TickOutcome::default();
        }
        self.tap.latest(&mut self.window);
        self.analyser
            .byte_frequency_data(&self.window, &mut self.spectrum);
        let features = self.extractor.extract(&self.spectrum);
        self.process_features(features, now)
    }

    /// Processes one byte frequency frame.
    pub fn process_spectrum(&mut self, spectrum: &[u8], now: Instant) -> TickOutcome {
        let features = self.extractor.extract(spectrum);
        self.process_features(features, now)
    }

    /// Processes one feature frame.
    pub fn process_features(&mut self, features: Features, now: Instant) -> TickOutcome {
        self.background(now);

        let mut out = TickOutcome::default();
        if !self.is_active() {
            return out;
        }

        self.ticks += 1;
        if self.ticks % LOG_EVERY == 0 {
            tracing::debug!(
                volume = features.volume,
                concentration = features.concentration,
                frames = self.pattern.len(),
                "engine: tick"
            );
        }

        self.pattern.push(features.pattern.clone());

        if let Mode::Game(letter) = self.mode {
            if !self.muted && self.pattern.is_ready() {
                if let Some(onset) =
                    self.onset
                        .should_trigger(features.volume, features.concentration, letter, now)
                {
                    out.onset = Some(onset);
                    self.request_clip();
                    self.evaluate(letter, now, &mut out);
                }
            }
        } else if let Mode::Calibrating(cal) = &mut self.mode {
            out.peak = cal.observe(&features, &self.pattern, now, &self.capture);
        }

        self.last = Some(features);
        out
    }

    fn evaluate(&mut self, letter: Letter, now: Instant, out: &mut TickOutcome) {
        let Some(rep) = self.pattern.representative() else {
            return;
        };
        let info = self.matcher.evaluate(&rep, letter, &self.store);

        match info.decision {
            Decision::Accepted => {
                let reinforced = info
                    .positive
                    .as_ref()
                    .and_then(|snap| self.store.reinforce(snap.id));
                if let Some((label, score)) = reinforced {
                    tracing::info!(%label, score, similarity = info.positive_score, "engine: accepted");
                    self.schedule_write(label, now);
                }
                self.onset.mark_accepted(now);
                out.accepted = true;
            }
            Decision::Rejected => {
                tracing::info!(
                    %letter,
                    positive = info.positive_score,
                    negative = info.negative_score,
                    "engine: rejected"
                );
            }
            Decision::Outranked(by) => {
                tracing::info!(
                    %letter,
                    %by,
                    positive = info.positive_score,
                    predicted = info.prediction.score,
                    "engine: outranked"
                );
            }
            Decision::None => {
                tracing::debug!(%letter, positive = info.positive_score, "engine: no match");
            }
        }

        out.prediction = Some(info.prediction.clone());
        out.matched = Some(info);
    }

    /// Starts recording a clip around the current onset. The clip lands in
    /// [`Engine::last_clip`] once complete.
    fn request_clip(&self) {
        match self.capture.capture() {
            Ok(handle) => {
                let tx = self.clips_tx.clone();
                tokio::spawn(async move {
                    if let Some(clip) = handle.wait().await {
                        let _ = tx.send(clip);
                    }
                });
            }
            Err(CaptureError::Busy) => {
                tracing::debug!("engine: {}", PhonemeError::CaptureBusy);
            }
            Err(CaptureError::NotBuffering) => {}
        }
    }

    /// Folds in finished clips, uploads and failed writes, then fires due
    /// writes.
    fn background(&mut self, now: Instant) {
        while let Ok(clip) = self.clips_rx.try_recv() {
            self.last_clip = Some(clip);
        }
        while let Ok(attachment) = self.attach_rx.try_recv() {
            self.fold_attachment(attachment);
        }
        for failure in self.writer.take_failures() {
            tracing::warn!(letter = %failure.letter, "engine: rescheduling write: {}", failure.error);
            self.schedule_write(failure.letter, now);
        }
        for (letter, records) in self.writes.take_due(now) {
            self.writer.submit(letter, records);
        }
    }

    fn schedule_write(&mut self, letter: Letter, now: Instant) {
        let records = self.store.records(letter);
        self.writes.schedule(letter, records, now);
    }

    /// Hands `letter` to the writer without waiting for the debounce.
    fn write_now(&mut self, letter: Letter) {
        self.writes.cancel(&letter);
        self.writer.submit(letter, self.store.records(letter));
    }

    fn fold_attachment(&mut self, attachment: Attachment) {
        self.uploads_in_flight = self.uploads_in_flight.saturating_sub(1);
        let Attachment { id, letter, audio_ref } = attachment;
        let Some(uri) = audio_ref else {
            return;
        };
        match self.store.attach_audio(id, uri) {
            Some(label) => self.write_now(label),
            None => tracing::debug!(%letter, snapshot = %id, "engine: clip for removed snapshot dropped"),
        }
    }

    /// Waits for every clip still recording or uploading and attaches it.
    pub async fn settle(&mut self) {
        while self.uploads_in_flight > 0 {
            match self.attach_rx.recv().await {
                Some(attachment) => self.fold_attachment(attachment),
                None => break,
            }
        }
    }

    /// Writes every pending letter now and waits for the writer.
    ///
    /// Failed letters are rescheduled; the first failure is returned.
    pub async fn flush(&mut self) -> Result<(), PhonemeError> {
        for (letter, records) in self.writes.drain() {
            self.writer.submit(letter, records);
        }
        self.writer.barrier().await?;

        let now = Instant::now();
        let mut first = None;
        for failure in self.writer.take_failures() {
            self.schedule_write(failure.letter, now);
            if first.is_none() {
                first = Some(failure.error);
            }
        }
        match first {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn game_letter(&self) -> Result<Letter, PhonemeError> {
        match self.mode {
            Mode::Game(letter) => Ok(letter),
            _ => Err(PhonemeError::SessionInactive),
        }
    }

    fn current_pattern(&self) -> Result<FeatureVector, PhonemeError> {
        self.pattern
            .representative()
            .filter(|p| !p.is_silent())
            .ok_or(PhonemeError::EmptyPattern)
    }

    /// The user says the last sound was right.
    ///
    /// Stores the current pattern as a positive for the session letter and
    /// writes it at once, then starts a new round. A clip recorded from this
    /// moment on is attached to the snapshot when it completes.
    pub fn manual_confirm(&mut self, owner: ProfileId, now: Instant) -> Result<SnapshotId, PhonemeError> {
        let letter = self.game_letter()?;
        let pattern = self.current_pattern()?;

        let id = self.add_snapshot(letter, SnapshotKind::Positive, &pattern, owner.clone(), None, now)?;
        self.write_now(letter);
        tracing::info!(%letter, snapshot = %id, "engine: manual confirm");

        if self.uploader.is_some() {
            match self.capture.capture() {
                Ok(handle) => {
                    let meta = ClipMeta {
                        owner,
                        letter,
                        negative: false,
                    };
                    self.attach_later(id, meta, PendingClip::Recording(handle));
                }
                Err(e) => tracing::debug!(%letter, "engine: no clip for confirm: {e}"),
            }
        }

        self.new_round();
        Ok(id)
    }

    /// The user says the last sound was wrong.
    ///
    /// Stores the current pattern as a negative for the session letter,
    /// with the clip recorded at the last trigger, and writes it at once.
    pub fn manual_reject(&mut self, owner: ProfileId, now: Instant) -> Result<SnapshotId, PhonemeError> {
        let letter = self.game_letter()?;
        let pattern = self.current_pattern()?;

        self.background(now);
        let clip = self.last_clip.take();
        let id = self.add_snapshot(letter, SnapshotKind::Negative, &pattern, owner, clip, now)?;
        self.write_now(letter);
        tracing::info!(%letter, snapshot = %id, "engine: manual reject");

        self.new_round();
        Ok(id)
    }

    fn new_round(&mut self) {
        self.pattern.clear();
        self.onset.reset();
    }

    /// Adds a snapshot and schedules its letter for writing.
    ///
    /// The snapshot is usable immediately. A `clip` is uploaded in the
    /// background and attached once stored; an upload failure is logged
    /// and the snapshot keeps no audio.
    pub fn add_snapshot(
        &mut self,
        letter: Letter,
        kind: SnapshotKind,
        pattern: &FeatureVector,
        owner: ProfileId,
        clip: Option<Clip>,
        now: Instant,
    ) -> Result<SnapshotId, PhonemeError> {
        if pattern.is_empty() || pattern.is_silent() {
            return Err(PhonemeError::EmptyPattern);
        }
        if !self.store.contains(letter) {
            return Err(PhonemeError::NoSuchLetter(letter));
        }

        let id = self.store.add(letter, kind, pattern, owner.clone(), None)?;
        self.schedule_write(letter, now);

        if let Some(clip) = clip {
            let meta = ClipMeta {
                owner,
                letter,
                negative: kind.is_negative(),
            };
            self.attach_later(id, meta, PendingClip::Ready(clip));
        }
        Ok(id)
    }

    /// Finishes, encodes and uploads a clip on a background task. The
    /// result is attached to snapshot `id` by a later tick.
    fn attach_later(&mut self, id: SnapshotId, meta: ClipMeta, clip: PendingClip) {
        let Some(uploader) = self.uploader.clone() else {
            return;
        };
        let tx = self.attach_tx.clone();
        self.uploads_in_flight += 1;
        tokio::spawn(async move {
            let clip = match clip {
                PendingClip::Ready(clip) => Some(clip),
                PendingClip::Recording(handle) => handle.wait().await,
            };
            let audio_ref = match clip {
                Some(clip) => upload(uploader.as_ref(), clip, &meta).await,
                None => None,
            };
            let _ = tx.send(Attachment {
                id,
                letter: meta.letter,
                audio_ref,
            });
        });
    }

    /// Deletes a snapshot and schedules its letter for writing.
    pub fn remove_snapshot(&mut self, id: SnapshotId, now: Instant) -> Result<Snapshot, PhonemeError> {
        let removed = self.store.remove(id)?;
        self.schedule_write(removed.label, now);
        tracing::info!(letter = %removed.label, snapshot = %id, "engine: snapshot removed");
        Ok(removed)
    }

    /// Starts collecting positives for `letter`.
    ///
    /// Pending writes are flushed first; a failed flush is logged and the
    /// letters stay scheduled.
    pub async fn start_calibration(&mut self, letter: Letter, owner: ProfileId) -> Result<(), PhonemeError> {
        if let Err(e) = self.flush().await {
            tracing::warn!(%letter, "engine: flush before calibration failed: {e}");
        }
        self.store.calibrate_letter(letter);
        self.open_input()?;
        self.mode = Mode::Calibrating(Calibrator::new(letter, owner, self.config.peak.clone()));
        tracing::info!(%letter, "engine: calibration started");
        Ok(())
    }

    /// Stores the pending calibration take as a positive snapshot.
    ///
    /// The take's clip keeps recording after this returns and is attached
    /// when done. Returns `Ok(None)` when no peak has been taken yet.
    pub fn accept_calibration(&mut self, now: Instant) -> Result<Option<SnapshotId>, PhonemeError> {
        let (take, letter, owner) = match &mut self.mode {
            Mode::Calibrating(cal) => (cal.take(), cal.letter(), cal.owner().clone()),
            _ => return Err(PhonemeError::SessionInactive),
        };
        let Some(take) = take else {
            return Ok(None);
        };

        let (pattern, handle) = take.into_parts();
        let id = self.add_snapshot(letter, SnapshotKind::Positive, &pattern, owner.clone(), None, now)?;
        if let Some(handle) = handle {
            let meta = ClipMeta {
                owner,
                letter,
                negative: false,
            };
            self.attach_later(id, meta, PendingClip::Recording(handle));
        }
        if let Mode::Calibrating(cal) = &mut self.mode {
            cal.record_accepted();
            tracing::info!(%letter, snapshot = %id, remaining = cal.remaining(), "engine: calibration take accepted");
        }
        Ok(Some(id))
    }

    /// Discards the pending calibration take.
    pub fn retry_calibration(&mut self) -> Result<(), PhonemeError> {
        match &mut self.mode {
            Mode::Calibrating(cal) => {
                cal.retry();
                Ok(())
            }
            _ => Err(PhonemeError::SessionInactive),
        }
    }

    /// `(accepted, suggested)` positives for the letter being calibrated.
    pub fn calibration_progress(&self) -> Option<(usize, usize)> {
        match &self.mode {
            Mode::Calibrating(cal) => Some((cal.accepted(), SNAPSHOTS_NEEDED)),
            _ => None,
        }
    }

    pub fn has_pending_take(&self) -> bool {
        matches!(&self.mode, Mode::Calibrating(cal) if cal.pending().is_some())
    }
}

async fn upload(uploader: &dyn ClipUploader, clip: Clip, meta: &ClipMeta) -> Option<String> {
    let wav = match clip.to_wav() {
        Ok(wav) => wav,
        Err(e) => {
            tracing::warn!(letter = %meta.letter, "engine: clip encoding failed: {e}");
            return None;
        }
    };
    match uploader.upload(wav, meta).await {
        Ok(uri) => {
            tracing::debug!(letter = %meta.letter, %uri, "engine: clip uploaded");
            Some(uri)
        }
        Err(e) => {
            tracing::warn!(letter = %meta.letter, "engine: {e}");
            None
        }
    }
}

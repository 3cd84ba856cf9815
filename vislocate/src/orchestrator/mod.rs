//! Localization orchestrator.
//!
//! [`LocalizationOrchestrator`] wires the filter chain, evaluator chain,
//! behavior requester and location fuser into one session-scoped state
//! machine and reports progress through a [`LocationListener`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                    LocalizationOrchestrator                       │
//! │                                                                   │
//! │  process_frame ──► FilterChain ──► Rejected ──► BehaviorRequester │
//! │                        │ Accepted                                 │
//! │                        ▼                                          │
//! │                 EvaluatorChain ──try_send──► EvaluationWorker     │
//! │                        ▲                           │              │
//! │                        └──── completion loop ◄─────┘              │
//! │                        │                           ▲              │
//! │             dequeue best frame                     │              │
//! │                        ▼                           │              │
//! │                 FrameUploader ─────────────────────┘              │
//! │                        │                                          │
//! │                        ▼                                          │
//! │                 LocationFuser ──► listener                        │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # State Machine
//!
//! ```text
//!          start_updating_location        best frame dequeued
//!  Stopped ----------------------> Localizing ------------> Uploading
//!     ^                                 ^                       |
//!     |   stop_updating_location        |   upload finished     |
//!     +---------------------------------+-----------------------+
//! ```
//!
//! At most one upload is outstanding: a best frame is only dequeued while
//! `Localizing` and no upload is in flight. Frames keep being filtered and
//! evaluated while `Uploading`.
//!
//! # Sessions
//!
//! Every start and stop opens a new session id. Evaluation and upload
//! completions carry the id they were dispatched under; completions from an
//! earlier session are dropped without touching state.
//!
//! Ending a session cancels its upload. The in-flight marker is only cleared
//! once the cancelled upload has reported back, so a session started right
//! after a stop waits for the old upload to wind down before sending its own.
//!
//! # Example
//!
//! ```ignore
//! use vislocate::{LocalizationOrchestrator, LocalizerConfig};
//!
//! let orchestrator = LocalizationOrchestrator::start(
//!     LocalizerConfig::default(),
//!     evaluator,
//!     uploader,
//!     listener,
//! )?;
//! orchestrator.start_updating_location();
//!
//! // from the camera callback
//! orchestrator.process_frame(frame)?;
//! ```

mod listener;
mod uploader;

pub use listener::LocationListener;
pub use uploader::{FrameUploader, SessionMetadata, UploadResponse};

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::behavior::{BehaviorRequest, BehaviorRequester};
use crate::config::LocalizerConfig;
use crate::error::{LocalizerError, UploadError};
use crate::evaluator::{
    EvaluationCompletion, EvaluationJob, EvaluationOutcome, EvaluationWorker, FrameEvaluator,
    FrameEvaluatorChain, ImageEnhancer,
};
use crate::filter::{FilterResult, FrameFilterChain, ImageQualityEstimator};
use crate::frame::Frame;
use crate::fuser::{Coordinate, FusedResult, LocationFuser};
use crate::rejection::RejectionReason;
use crate::statistics::FrameEvaluationStatistics;

// =============================================================================
// State
// =============================================================================

/// Lifecycle state of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocalizerState {
    /// Not localizing. Frames are ignored.
    #[default]
    Stopped,
    /// Selecting a frame to upload.
    Localizing,
    /// A frame is being uploaded.
    Uploading,
}

impl LocalizerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocalizerState::Stopped => "stopped",
            LocalizerState::Localizing => "localizing",
            LocalizerState::Uploading => "uploading",
        }
    }
}

impl fmt::Display for LocalizerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Listener events collected under the session lock and delivered after it
/// is released.
enum Notification {
    StateChanged(LocalizerState),
    FrameRejected(RejectionReason),
    BehaviorRequested(BehaviorRequest),
    FrameEvaluated(EvaluationOutcome),
    UploadStarted(SessionMetadata),
    LocationUpdated(FusedResult),
    Error(LocalizerError),
}

/// A finished upload on its way back to the completion loop.
struct UploadCompletion {
    session: u64,
    result: Result<UploadResponse, UploadError>,
}

/// Mutable state of the current localization session.
struct Session {
    state: LocalizerState,
    id: u64,
    uploads: u64,
    /// Survives session changes until the upload reports back.
    upload_in_flight: bool,
    /// Cancels uploads started in the current session.
    upload_cancel: CancellationToken,
    filters: FrameFilterChain,
    evaluator: FrameEvaluatorChain,
    behavior: BehaviorRequester,
    fuser: LocationFuser,
    statistics: FrameEvaluationStatistics,
    approximate_location: Option<Coordinate>,
}

impl Session {
    fn new(config: &LocalizerConfig, upload_cancel: CancellationToken, now: Instant) -> Self {
        Self {
            state: LocalizerState::Stopped,
            id: 0,
            uploads: 0,
            upload_in_flight: false,
            upload_cancel,
            filters: FrameFilterChain::new(&config.filters, now),
            evaluator: FrameEvaluatorChain::new(config.evaluator.clone(), now),
            behavior: BehaviorRequester::new(&config.behavior, now),
            fuser: LocationFuser::new(),
            statistics: FrameEvaluationStatistics::new(),
            approximate_location: None,
        }
    }

    fn set_state(&mut self, state: LocalizerState, notes: &mut Vec<Notification>) {
        if self.state == state {
            return;
        }
        info!(from = %self.state, to = %state, session = self.id, "Localizer state changed");
        self.state = state;
        notes.push(Notification::StateChanged(state));
    }

    /// Open a new session id and cancel the old session's upload.
    fn next_session(&mut self, shutdown: &CancellationToken) {
        self.id += 1;
        self.upload_cancel.cancel();
        self.upload_cancel = shutdown.child_token();
    }
}

// =============================================================================
// Shared core
// =============================================================================

struct Shared {
    config: LocalizerConfig,
    session: Mutex<Session>,
    listener: Arc<dyn LocationListener>,
    uploader: Arc<dyn FrameUploader>,
    job_tx: mpsc::Sender<(u64, EvaluationJob)>,
    upload_tx: mpsc::UnboundedSender<UploadCompletion>,
    runtime: Handle,
    shutdown: CancellationToken,
}

impl Shared {
    /// Hand the window's best frame to the uploader if one is ready.
    fn try_dequeue(&self, session: &mut Session, now: Instant, notes: &mut Vec<Notification>) {
        if session.state != LocalizerState::Localizing || session.upload_in_flight {
            return;
        }
        let Some(frame) = session.evaluator.dequeue_best_frame(now) else {
            return;
        };

        session.statistics.start_window(Utc::now());
        session.set_state(LocalizerState::Uploading, notes);
        session.uploads += 1;
        session.upload_in_flight = true;

        let metadata = SessionMetadata {
            session_id: session.id,
            upload_index: session.uploads,
            approximate_location: session.approximate_location,
            remote_config_id: self.config.remote_config_id.clone(),
        };
        notes.push(Notification::UploadStarted(metadata.clone()));

        info!(
            session = session.id,
            upload = session.uploads,
            score = frame.score(),
            "Uploading best frame"
        );

        let uploader = Arc::clone(&self.uploader);
        let upload_tx = self.upload_tx.clone();
        let cancel = session.upload_cancel.clone();
        let session_id = session.id;
        self.runtime.spawn(async move {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(session = session_id, "Upload cancelled");
                    Err(UploadError::Cancelled)
                }
                result = uploader.upload(frame, metadata) => result,
            };
            let completion = UploadCompletion {
                session: session_id,
                result,
            };
            if upload_tx.send(completion).is_err() {
                debug!(session = session_id, "Completion loop gone, dropping upload result");
            }
        });
    }

    fn handle_evaluation(&self, completion: EvaluationCompletion) {
        let now = Instant::now();
        let mut notes = Vec::new();
        {
            let mut session = self.session.lock();
            if completion.session != session.id || session.state == LocalizerState::Stopped {
                debug!(
                    session = completion.session,
                    "Ignoring evaluation from previous session"
                );
                return;
            }

            let evaluation = completion.evaluation;
            if let Some(info) = evaluation.as_ref().and_then(|e| e.user_info.as_ref()) {
                session.statistics.record_evaluation_info(info);
            }
            let outcome = session.evaluator.complete_evaluation(
                completion.ticket,
                completion.frame,
                evaluation.clone(),
            );

            match outcome {
                EvaluationOutcome::Stale => {}
                EvaluationOutcome::NewBest { score } => {
                    let duration = evaluation.map(|e| e.duration).unwrap_or_default();
                    session.statistics.add_evaluation(score, duration);
                    session.statistics.set_current_best(score);
                    notes.push(Notification::FrameEvaluated(outcome));
                }
                EvaluationOutcome::Discarded(reason) => {
                    if let Some(e) = evaluation {
                        session.statistics.add_evaluation(e.score, e.duration);
                    }
                    session.statistics.add_rejection(reason);
                    notes.push(Notification::FrameEvaluated(outcome));
                    notes.push(Notification::FrameRejected(reason));
                }
            }

            self.try_dequeue(&mut session, now, &mut notes);
        }
        self.dispatch(notes);
    }

    fn handle_upload(&self, completion: UploadCompletion) {
        let now = Instant::now();
        let mut notes = Vec::new();
        {
            let mut session = self.session.lock();
            session.upload_in_flight = false;

            if completion.session != session.id || session.state == LocalizerState::Stopped {
                debug!(
                    session = completion.session,
                    "Ignoring upload from previous session"
                );
            } else {
                session.set_state(LocalizerState::Localizing, &mut notes);
                match completion.result {
                    Ok(response) => {
                        let fused = session.fuser.fuse(response.coordinate, response.zones);
                        info!(
                            location = %fused.coordinate,
                            confidence = %fused.confidence,
                            samples = fused.sample_count,
                            "Location updated"
                        );
                        notes.push(Notification::LocationUpdated(fused));
                    }
                    Err(error) => {
                        warn!(error = %error, "Upload failed");
                        notes.push(Notification::Error(LocalizerError::Upload(error)));
                    }
                }
            }

            // the current session may have a frame waiting on this upload
            self.try_dequeue(&mut session, now, &mut notes);
        }
        self.dispatch(notes);
    }

    fn dispatch(&self, notes: Vec<Notification>) {
        for note in notes {
            match note {
                Notification::StateChanged(state) => self.listener.on_state_changed(state),
                Notification::FrameRejected(reason) => self.listener.on_frame_rejected(reason),
                Notification::BehaviorRequested(behavior) => {
                    self.listener.on_behavior_requested(behavior)
                }
                Notification::FrameEvaluated(outcome) => self.listener.on_frame_evaluated(outcome),
                Notification::UploadStarted(metadata) => self.listener.on_upload_started(&metadata),
                Notification::LocationUpdated(result) => self.listener.on_location_updated(&result),
                Notification::Error(error) => self.listener.on_error(&error),
            }
        }
    }
}

/// Applies evaluation and upload completions one at a time.
async fn run_completion_loop(
    shared: Arc<Shared>,
    mut evaluation_rx: mpsc::UnboundedReceiver<EvaluationCompletion>,
    mut upload_rx: mpsc::UnboundedReceiver<UploadCompletion>,
    shutdown: CancellationToken,
) {
    info!("Completion loop starting");

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("Completion loop shutting down");
                break;
            }

            Some(completion) = evaluation_rx.recv() => {
                shared.handle_evaluation(completion);
            }

            Some(completion) = upload_rx.recv() => {
                shared.handle_upload(completion);
            }

            else => break,
        }
    }

    info!("Completion loop stopped");
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Session-scoped localization state machine.
///
/// All methods take `&self` and may be called from any thread. Background
/// tasks stop when the orchestrator is shut down or dropped.
pub struct LocalizationOrchestrator {
    shared: Arc<Shared>,
    shutdown: CancellationToken,
}

impl LocalizationOrchestrator {
    /// Start the orchestrator on the current Tokio runtime.
    ///
    /// The orchestrator begins in [`LocalizerState::Stopped`]; call
    /// [`start_updating_location`](Self::start_updating_location) to begin.
    pub fn start(
        config: LocalizerConfig,
        evaluator: Arc<dyn FrameEvaluator>,
        uploader: Arc<dyn FrameUploader>,
        listener: Arc<dyn LocationListener>,
    ) -> Result<Self, LocalizerError> {
        let runtime =
            Handle::try_current().map_err(|e| LocalizerError::NoRuntime(e.to_string()))?;
        Self::start_on(runtime, config, evaluator, uploader, listener)
    }

    /// Start the orchestrator on an explicit runtime.
    ///
    /// Lets hosts that drive frames from non-runtime threads own the runtime
    /// themselves.
    pub fn start_on(
        runtime: Handle,
        config: LocalizerConfig,
        evaluator: Arc<dyn FrameEvaluator>,
        uploader: Arc<dyn FrameUploader>,
        listener: Arc<dyn LocationListener>,
    ) -> Result<Self, LocalizerError> {
        config.validate()?;
        info!("Starting LocalizationOrchestrator");

        let shutdown = CancellationToken::new();
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let (upload_tx, upload_rx) = mpsc::unbounded_channel();
        let (mut worker, job_tx) = EvaluationWorker::new(evaluator, completion_tx);
        if config.evaluator.image_enhancer_enabled {
            worker = worker.with_enhancer(ImageEnhancer::new(config.evaluator.target_brightness));
        }

        let session = Session::new(&config, shutdown.child_token(), Instant::now());
        let shared = Arc::new(Shared {
            config,
            session: Mutex::new(session),
            listener,
            uploader,
            job_tx,
            upload_tx,
            runtime: runtime.clone(),
            shutdown: shutdown.clone(),
        });

        runtime.spawn(worker.run(shutdown.child_token()));
        runtime.spawn(run_completion_loop(
            Arc::clone(&shared),
            completion_rx,
            upload_rx,
            shutdown.child_token(),
        ));

        info!(
            filters = ?shared.session.lock().filters.filter_names(),
            "LocalizationOrchestrator started"
        );
        Ok(Self { shared, shutdown })
    }

    /// Begin a new localization session.
    ///
    /// Resets every component, so calling it while already localizing
    /// restarts the session.
    pub fn start_updating_location(&self) {
        let now = Instant::now();
        let mut notes = Vec::new();
        {
            let mut session = self.shared.session.lock();
            session.next_session(&self.shared.shutdown);
            session.uploads = 0;
            session.filters.restart(now);
            session.evaluator.reset(now);
            session.behavior.restart(now);
            session.fuser.reset();
            session.statistics.reset();
            session.statistics.start_window(Utc::now());
            session.set_state(LocalizerState::Localizing, &mut notes);
            info!(session = session.id, "Localization session started");
        }
        self.shared.dispatch(notes);
    }

    /// End the current session.
    ///
    /// Evaluations and uploads still in flight complete without effect.
    pub fn stop_updating_location(&self) {
        let now = Instant::now();
        let mut notes = Vec::new();
        {
            let mut session = self.shared.session.lock();
            session.next_session(&self.shared.shutdown);
            session.evaluator.reset(now);
            session.set_state(LocalizerState::Stopped, &mut notes);
        }
        self.shared.dispatch(notes);
    }

    /// Feed one frame from the tracking source.
    ///
    /// Filtering runs synchronously on the calling thread. Frames are
    /// ignored while stopped. Fails only if the evaluation worker is gone.
    pub fn process_frame(&self, frame: Frame) -> Result<(), LocalizerError> {
        let now = Instant::now();
        let mut notes = Vec::new();
        let mut result = Ok(());
        {
            let mut session = self.shared.session.lock();
            if session.state == LocalizerState::Stopped {
                return Ok(());
            }

            session.statistics.record_frame(&frame);
            match session.filters.accepts(&frame, now) {
                FilterResult::Rejected(reason) => {
                    session.statistics.add_rejection(reason);
                    notes.push(Notification::FrameRejected(reason));
                    if self.shared.config.behavior.enabled {
                        if let Some(behavior) = session.behavior.process_rejection(reason, now) {
                            notes.push(Notification::BehaviorRequested(behavior));
                        }
                    }
                }
                FilterResult::Accepted => match session.evaluator.begin_evaluation(frame) {
                    Err(reason) => {
                        session.statistics.add_rejection(reason);
                        notes.push(Notification::FrameRejected(reason));
                    }
                    Ok(job) => {
                        let ticket = job.ticket;
                        match self.shared.job_tx.try_send((session.id, job)) {
                            Ok(()) => {}
                            Err(TrySendError::Full(_)) => {
                                // worker still busy with a job from before a reset
                                session.evaluator.abandon_evaluation(ticket);
                                let reason = RejectionReason::OtherEvaluationInProgress;
                                session.statistics.add_rejection(reason);
                                notes.push(Notification::FrameRejected(reason));
                            }
                            Err(TrySendError::Closed(_)) => {
                                session.evaluator.abandon_evaluation(ticket);
                                warn!("Evaluation worker is not running");
                                result = Err(LocalizerError::WorkerUnavailable("evaluation"));
                            }
                        }
                    }
                },
            }

            self.shared.try_dequeue(&mut session, now, &mut notes);
        }
        self.shared.dispatch(notes);
        result
    }

    /// Provide the estimator behind the image quality filter.
    ///
    /// Returns `false` when the filter is disabled in config.
    pub fn set_image_quality_estimator(&self, estimator: Box<dyn ImageQualityEstimator>) -> bool {
        self.shared
            .session
            .lock()
            .filters
            .install_image_quality_estimator(estimator)
    }

    /// Set the coarse device location sent with uploads.
    pub fn set_approximate_location(&self, location: Option<Coordinate>) {
        self.shared.session.lock().approximate_location = location;
    }

    pub fn state(&self) -> LocalizerState {
        self.shared.session.lock().state
    }

    /// Snapshot of the current session's evaluation statistics.
    pub fn statistics(&self) -> FrameEvaluationStatistics {
        self.shared.session.lock().statistics.clone()
    }

    /// Stop localizing and end the background tasks.
    pub fn shutdown(self) {
        info!("Shutting down LocalizationOrchestrator");
        self.stop_updating_location();
        self.shutdown.cancel();
    }
}

impl Drop for LocalizationOrchestrator {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::BoxFuture;
    use crate::frame::{FrameEvaluation, Orientation, Pose, Position, TrackingState};
    use crate::fuser::Confidence;
    use std::time::Duration;

    // =========================================================================
    // Test doubles
    // =========================================================================

    struct InstantEvaluator(f32);

    impl FrameEvaluator for InstantEvaluator {
        fn evaluate<'a>(&'a self, _frame: &'a Frame) -> BoxFuture<'a, Option<FrameEvaluation>> {
            let score = self.0;
            Box::pin(async move { Some(FrameEvaluation::new(score, Duration::from_millis(1))) })
        }
    }

    struct FixedUploader(Coordinate);

    impl FrameUploader for FixedUploader {
        fn upload(
            &self,
            _frame: Frame,
            _metadata: SessionMetadata,
        ) -> BoxFuture<'_, Result<UploadResponse, UploadError>> {
            let coordinate = self.0;
            Box::pin(async move {
                Ok(UploadResponse {
                    coordinate,
                    zones: Vec::new(),
                })
            })
        }
    }

    #[derive(Default)]
    struct RecordingListener {
        states: Mutex<Vec<LocalizerState>>,
        locations: Mutex<Vec<FusedResult>>,
        rejections: Mutex<Vec<RejectionReason>>,
    }

    impl LocationListener for RecordingListener {
        fn on_location_updated(&self, result: &FusedResult) {
            self.locations.lock().push(result.clone());
        }

        fn on_error(&self, _error: &LocalizerError) {}

        fn on_frame_rejected(&self, reason: RejectionReason) {
            self.rejections.lock().push(reason);
        }

        fn on_state_changed(&self, state: LocalizerState) {
            self.states.lock().push(state);
        }
    }

    fn fast_config() -> LocalizerConfig {
        let mut config = LocalizerConfig::default();
        config.evaluator.min_window_time = Duration::ZERO;
        config.evaluator.max_window_time = Duration::from_millis(20);
        config
    }

    fn frame(x: f32) -> Frame {
        Frame::new(
            Pose::new(Position::new(x, 0.0, 0.0), Orientation::IDENTITY),
            TrackingState::Tracking,
            Duration::ZERO,
        )
    }

    fn start(listener: Arc<RecordingListener>) -> LocalizationOrchestrator {
        LocalizationOrchestrator::start(
            fast_config(),
            Arc::new(InstantEvaluator(0.95)),
            Arc::new(FixedUploader(Coordinate::new(48.85, 2.35))),
            listener,
        )
        .unwrap()
    }

    // =========================================================================
    // Tests
    // =========================================================================

    #[test]
    fn test_start_requires_runtime() {
        let result = LocalizationOrchestrator::start(
            LocalizerConfig::default(),
            Arc::new(InstantEvaluator(0.5)),
            Arc::new(FixedUploader(Coordinate::new(0.0, 0.0))),
            Arc::new(RecordingListener::default()),
        );
        assert!(matches!(result, Err(LocalizerError::NoRuntime(_))));
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_config() {
        let mut config = LocalizerConfig::default();
        config.evaluator.max_window_time = Duration::ZERO;
        let result = LocalizationOrchestrator::start(
            config,
            Arc::new(InstantEvaluator(0.5)),
            Arc::new(FixedUploader(Coordinate::new(0.0, 0.0))),
            Arc::new(RecordingListener::default()),
        );
        assert!(matches!(result, Err(LocalizerError::Config(_))));
    }

    #[tokio::test]
    async fn test_initial_state_is_stopped() {
        let orchestrator = start(Arc::new(RecordingListener::default()));
        assert_eq!(orchestrator.state(), LocalizerState::Stopped);
    }

    #[tokio::test]
    async fn test_frames_ignored_while_stopped() {
        let listener = Arc::new(RecordingListener::default());
        let orchestrator = start(Arc::clone(&listener));
        orchestrator.process_frame(frame(0.0)).unwrap();
        assert!(listener.rejections.lock().is_empty());
        assert_eq!(orchestrator.statistics().total_evaluations(), 0);
    }

    #[tokio::test]
    async fn test_start_and_stop_transitions() {
        let listener = Arc::new(RecordingListener::default());
        let orchestrator = start(Arc::clone(&listener));

        orchestrator.start_updating_location();
        assert_eq!(orchestrator.state(), LocalizerState::Localizing);
        orchestrator.stop_updating_location();
        assert_eq!(orchestrator.state(), LocalizerState::Stopped);

        assert_eq!(
            *listener.states.lock(),
            vec![LocalizerState::Localizing, LocalizerState::Stopped]
        );
    }

    #[tokio::test]
    async fn test_filter_rejection_reaches_listener() {
        let listener = Arc::new(RecordingListener::default());
        let orchestrator = start(Arc::clone(&listener));
        orchestrator.start_updating_location();

        let mut paused = frame(0.0);
        paused.tracking_state = TrackingState::Stopped;
        orchestrator.process_frame(paused).unwrap();

        assert_eq!(
            *listener.rejections.lock(),
            vec![RejectionReason::TrackingUnavailable]
        );
        assert_eq!(
            orchestrator
                .statistics()
                .rejection_count(RejectionReason::TrackingUnavailable),
            1
        );
    }

    #[tokio::test]
    async fn test_frame_to_location() {
        let listener = Arc::new(RecordingListener::default());
        let orchestrator = start(Arc::clone(&listener));
        orchestrator.start_updating_location();

        orchestrator.process_frame(frame(0.0)).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        orchestrator.process_frame(frame(1.0)).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let locations = listener.locations.lock();
        assert!(!locations.is_empty(), "expected at least one location");
        assert_eq!(locations[0].coordinate, Coordinate::new(48.85, 2.35));
        assert_eq!(locations[0].confidence, Confidence::Low);
        assert_eq!(orchestrator.state(), LocalizerState::Localizing);
    }

    #[tokio::test]
    async fn test_shutdown_stops() {
        let listener = Arc::new(RecordingListener::default());
        let orchestrator = start(Arc::clone(&listener));
        orchestrator.start_updating_location();
        orchestrator.shutdown();
        assert_eq!(
            listener.states.lock().last().copied(),
            Some(LocalizerState::Stopped)
        );
    }

    #[test]
    fn test_state_display() {
        assert_eq!(LocalizerState::Uploading.to_string(), "uploading");
        assert_eq!(LocalizerState::default(), LocalizerState::Stopped);
    }
}

//! Windowed best-frame selection.
//!
//! Frames that pass the filter chain are scored by a [`FrameEvaluator`]. The
//! [`FrameEvaluatorChain`] keeps the best-scoring frame of the current
//! [`Window`] and hands it out once the window has been open long enough.
//!
//! # Single flight
//!
//! At most one evaluation is outstanding. A frame arriving while another is
//! being scored is dropped with
//! [`OtherEvaluationInProgress`](RejectionReason::OtherEvaluationInProgress),
//! never queued.
//!
//! # Window timing
//!
//! ```text
//!  start          min_window_time                max_window_time
//!    |-------------------|-------------------------------|
//!    |   never closes    | closes if best >= high score  | closes with any best
//! ```
//!
//! # Stale completions
//!
//! Every evaluation carries an [`EvaluationTicket`] naming the window it was
//! started in. A completion whose window has since been dequeued or reset is
//! discarded as [`EvaluationOutcome::Stale`] and never touches the live
//! window.

mod enhancer;
mod worker;

pub use enhancer::ImageEnhancer;
pub use worker::{EvaluationCompletion, EvaluationWorker};

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::config::EvaluatorChainConfig;
use crate::frame::{Frame, FrameEvaluation};
use crate::rejection::RejectionReason;

/// Boxed future used by the collaborator traits so they stay object safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Scores frames.
///
/// Typically wraps an on-device model. Returning `None` signals a failed
/// evaluation; the chain absorbs it rather than stalling the window.
pub trait FrameEvaluator: Send + Sync {
    fn evaluate<'a>(&'a self, frame: &'a Frame) -> BoxFuture<'a, Option<FrameEvaluation>>;
}

/// Identifies one dispatched evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EvaluationTicket {
    /// Window the frame was accepted into.
    pub window_id: u64,
    /// Monotonic dispatch counter.
    pub sequence: u64,
}

/// A frame handed to the evaluator.
#[derive(Debug, Clone)]
pub struct EvaluationJob {
    pub ticket: EvaluationTicket,
    pub frame: Frame,
}

/// Result of applying a completed evaluation to the chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EvaluationOutcome {
    /// The frame is now the window's best candidate.
    NewBest { score: f32 },
    /// The frame was scored but not kept.
    Discarded(RejectionReason),
    /// The window the frame belonged to no longer exists.
    Stale,
}

/// One accumulation period.
#[derive(Debug, Clone)]
pub struct Window {
    id: u64,
    start: Instant,
    current_best: Option<Frame>,
    evaluations: u32,
    rejections: u32,
}

impl Window {
    fn new(id: u64, start: Instant) -> Self {
        Self {
            id,
            start,
            current_best: None,
            evaluations: 0,
            rejections: 0,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn start(&self) -> Instant {
        self.start
    }

    pub fn current_best(&self) -> Option<&Frame> {
        self.current_best.as_ref()
    }

    pub fn current_best_score(&self) -> Option<f32> {
        self.current_best.as_ref().and_then(|f| f.score())
    }

    /// Completed evaluations applied to this window.
    pub fn evaluations(&self) -> u32 {
        self.evaluations
    }

    /// Frames turned away by this window.
    pub fn rejections(&self) -> u32 {
        self.rejections
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.start)
    }
}

/// Windowed, single-flight best-frame selector.
#[derive(Debug)]
pub struct FrameEvaluatorChain {
    config: EvaluatorChainConfig,
    window: Window,
    next_window_id: u64,
    next_sequence: u64,
    in_flight: Option<EvaluationTicket>,
}

impl FrameEvaluatorChain {
    pub fn new(config: EvaluatorChainConfig, now: Instant) -> Self {
        Self {
            config,
            window: Window::new(0, now),
            next_window_id: 1,
            next_sequence: 0,
            in_flight: None,
        }
    }

    /// Create with default timing.
    pub fn with_defaults(now: Instant) -> Self {
        Self::new(EvaluatorChainConfig::default(), now)
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn is_evaluating(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Claim the evaluation slot for `frame`.
    ///
    /// Fails with `OtherEvaluationInProgress` while another evaluation is
    /// outstanding; the frame is dropped in that case.
    pub fn begin_evaluation(&mut self, frame: Frame) -> Result<EvaluationJob, RejectionReason> {
        if self.in_flight.is_some() {
            self.window.rejections += 1;
            return Err(RejectionReason::OtherEvaluationInProgress);
        }

        let ticket = EvaluationTicket {
            window_id: self.window.id,
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;
        self.in_flight = Some(ticket);

        debug!(
            window = ticket.window_id,
            sequence = ticket.sequence,
            "Evaluation dispatched"
        );
        Ok(EvaluationJob { ticket, frame })
    }

    /// Release the evaluation slot without a result.
    ///
    /// Used when a claimed job could not be handed to the evaluator.
    pub fn abandon_evaluation(&mut self, ticket: EvaluationTicket) {
        if self.in_flight == Some(ticket) {
            self.in_flight = None;
        }
    }

    /// Apply a finished evaluation.
    ///
    /// Compares against the window's best as it is now, not as it was when
    /// the evaluation was dispatched.
    pub fn complete_evaluation(
        &mut self,
        ticket: EvaluationTicket,
        mut frame: Frame,
        evaluation: Option<FrameEvaluation>,
    ) -> EvaluationOutcome {
        if self.in_flight != Some(ticket) {
            debug!(sequence = ticket.sequence, "Ignoring completion for unknown evaluation");
            return EvaluationOutcome::Stale;
        }
        self.in_flight = None;

        if ticket.window_id != self.window.id {
            debug!(
                ticket_window = ticket.window_id,
                live_window = self.window.id,
                "Discarding stale evaluation"
            );
            return EvaluationOutcome::Stale;
        }

        self.window.evaluations += 1;

        let (evaluation, is_sentinel) = match evaluation {
            Some(evaluation) if evaluation.score.is_finite() => (evaluation, false),
            failed if self.window.current_best.is_none() => {
                debug!("Evaluator failed, keeping frame with sentinel score");
                let user_info = failed.and_then(|e| e.user_info);
                (FrameEvaluation::sentinel(user_info), true)
            }
            _ => return self.discard(RejectionReason::EvaluatorError),
        };

        let score = evaluation.score;
        frame.evaluation = Some(evaluation);

        if !is_sentinel {
            if score < self.config.min_score_threshold {
                return self.discard(RejectionReason::ScoreBelowMinThreshold);
            }
            if self
                .window
                .current_best_score()
                .is_some_and(|best| best > score)
            {
                return self.discard(RejectionReason::ScoreBelowCurrentBest);
            }
        }

        debug!(window = self.window.id, score, "New best frame");
        self.window.current_best = Some(frame);
        EvaluationOutcome::NewBest { score }
    }

    fn discard(&mut self, reason: RejectionReason) -> EvaluationOutcome {
        self.window.rejections += 1;
        EvaluationOutcome::Discarded(reason)
    }

    /// Take the window's best frame if the window may close.
    ///
    /// Requires `min_window_time` to have passed, and either a best score at
    /// or above `min_high_quality_score` or `max_window_time` to have passed.
    /// On success a fresh window starts at `now`.
    pub fn dequeue_best_frame(&mut self, now: Instant) -> Option<Frame> {
        let elapsed = self.window.elapsed(now);
        let score = self.window.current_best_score()?;

        if elapsed < self.config.min_window_time {
            return None;
        }
        if score < self.config.min_high_quality_score && elapsed < self.config.max_window_time {
            return None;
        }

        let frame = self.window.current_best.take();
        info!(
            window = self.window.id,
            score,
            elapsed_ms = elapsed.as_millis() as u64,
            evaluations = self.window.evaluations,
            rejections = self.window.rejections,
            "Window closed"
        );
        self.start_window(now);
        frame
    }

    /// Start a new window and drop any outstanding evaluation.
    pub fn reset(&mut self, now: Instant) {
        self.in_flight = None;
        self.start_window(now);
    }

    fn start_window(&mut self, now: Instant) {
        self.window = Window::new(self.next_window_id, now);
        self.next_window_id += 1;
    }
}

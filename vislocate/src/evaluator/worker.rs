//! Background task that runs the frame evaluator.
//!
//! The worker owns the evaluator and receives jobs over a single-slot
//! channel. Dark frames are brightened first when an [`ImageEnhancer`] is
//! configured. Each result is sent back on the completion channel so that
//! only one place mutates window state.
//!
//! ```text
//! process_frame ──try_send──► [slot] ──► EvaluationWorker ──► enhance ──► evaluate()
//!                                                │
//!            completion loop ◄── EvaluationCompletion
//! ```

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{EvaluationJob, EvaluationTicket, FrameEvaluator, ImageEnhancer};
use crate::frame::{Frame, FrameEvaluation};

/// Capacity of the job channel. One slot: the chain never dispatches a
/// second job while one is outstanding.
pub const JOB_CHANNEL_CAPACITY: usize = 1;

/// A finished evaluation on its way back to the chain.
#[derive(Debug)]
pub struct EvaluationCompletion {
    /// Session the job was dispatched in.
    pub session: u64,
    pub ticket: EvaluationTicket,
    pub frame: Frame,
    pub evaluation: Option<FrameEvaluation>,
}

/// Runs evaluations one at a time.
pub struct EvaluationWorker {
    evaluator: Arc<dyn FrameEvaluator>,
    enhancer: Option<ImageEnhancer>,
    job_rx: mpsc::Receiver<(u64, EvaluationJob)>,
    completion_tx: mpsc::UnboundedSender<EvaluationCompletion>,
}

impl EvaluationWorker {
    /// Creates a worker with its job channel.
    ///
    /// Returns the worker and the sender used to dispatch `(session, job)`
    /// pairs.
    pub fn new(
        evaluator: Arc<dyn FrameEvaluator>,
        completion_tx: mpsc::UnboundedSender<EvaluationCompletion>,
    ) -> (Self, mpsc::Sender<(u64, EvaluationJob)>) {
        let (job_tx, job_rx) = mpsc::channel(JOB_CHANNEL_CAPACITY);
        let worker = Self {
            evaluator,
            enhancer: None,
            job_rx,
            completion_tx,
        };
        (worker, job_tx)
    }

    /// Brighten dark frames before they are scored.
    pub fn with_enhancer(mut self, enhancer: ImageEnhancer) -> Self {
        self.enhancer = Some(enhancer);
        self
    }

    /// Runs until shutdown is signalled or every sender is dropped.
    pub async fn run(self, shutdown: CancellationToken) {
        info!("Evaluation worker starting");

        let Self {
            evaluator,
            enhancer,
            mut job_rx,
            completion_tx,
        } = self;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Evaluation worker shutting down");
                    break;
                }

                job = job_rx.recv() => {
                    let Some((session, job)) = job else {
                        debug!("Job channel closed");
                        break;
                    };

                    let mut frame = job.frame;
                    if let Some(enhancer) = &enhancer {
                        enhancer.enhance_frame(&mut frame);
                    }

                    let started = Instant::now();
                    let evaluation = evaluator.evaluate(&frame).await;
                    debug!(
                        sequence = job.ticket.sequence,
                        score = evaluation.as_ref().map(|e| e.score),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Evaluation finished"
                    );

                    let completion = EvaluationCompletion {
                        session,
                        ticket: job.ticket,
                        frame,
                        evaluation,
                    };
                    if completion_tx.send(completion).is_err() {
                        debug!("Completion receiver dropped");
                        break;
                    }
                }
            }
        }

        info!("Evaluation worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::{BoxFuture, FrameEvaluatorChain};
    use crate::frame::{Pose, TrackingState};
    use image::{GrayImage, Luma};
    use std::time::Duration;

    struct FixedEvaluator(f32);

    impl FrameEvaluator for FixedEvaluator {
        fn evaluate<'a>(&'a self, _frame: &'a Frame) -> BoxFuture<'a, Option<FrameEvaluation>> {
            let score = self.0;
            Box::pin(async move { Some(FrameEvaluation::new(score, Duration::from_millis(1))) })
        }
    }

    fn frame() -> Frame {
        Frame::new(Pose::default(), TrackingState::Tracking, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_worker_returns_completion() {
        let (completion_tx, mut completion_rx) = mpsc::unbounded_channel();
        let (worker, job_tx) = EvaluationWorker::new(Arc::new(FixedEvaluator(0.8)), completion_tx);
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(worker.run(shutdown.clone()));

        let mut chain = FrameEvaluatorChain::with_defaults(Instant::now());
        let job = chain.begin_evaluation(frame()).unwrap();
        let ticket = job.ticket;
        job_tx.send((7, job)).await.unwrap();

        let completion = completion_rx.recv().await.unwrap();
        assert_eq!(completion.session, 7);
        assert_eq!(completion.ticket, ticket);
        assert_eq!(completion.evaluation.as_ref().map(|e| e.score), Some(0.8));

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_worker_enhances_before_evaluating() {
        let (completion_tx, mut completion_rx) = mpsc::unbounded_channel();
        let (worker, job_tx) = EvaluationWorker::new(Arc::new(FixedEvaluator(0.8)), completion_tx);
        let worker = worker.with_enhancer(ImageEnhancer::new(0.3));
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(worker.run(shutdown.clone()));

        let dark = frame().with_image(GrayImage::from_pixel(8, 8, Luma([20])));
        let mut chain = FrameEvaluatorChain::with_defaults(Instant::now());
        job_tx.send((1, chain.begin_evaluation(dark).unwrap())).await.unwrap();

        let completion = completion_rx.recv().await.unwrap();
        assert!(completion.frame.enhanced_gamma.is_some());
        assert!(completion.frame.image.unwrap().get_pixel(0, 0).0[0] > 20);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_single_slot_channel() {
        let (completion_tx, _completion_rx) = mpsc::unbounded_channel();
        let (_worker, job_tx) = EvaluationWorker::new(Arc::new(FixedEvaluator(0.8)), completion_tx);

        let mut chain = FrameEvaluatorChain::with_defaults(Instant::now());
        let first = chain.begin_evaluation(frame()).unwrap();
        chain.abandon_evaluation(first.ticket);
        let second = chain.begin_evaluation(frame()).unwrap();

        // worker not running: the slot fills after one job
        assert!(job_tx.try_send((0, first)).is_ok());
        assert!(job_tx.try_send((0, second)).is_err());
    }

    #[tokio::test]
    async fn test_worker_stops_when_senders_dropped() {
        let (completion_tx, _completion_rx) = mpsc::unbounded_channel();
        let (worker, job_tx) = EvaluationWorker::new(Arc::new(FixedEvaluator(0.1)), completion_tx);
        drop(job_tx);
        tokio::time::timeout(Duration::from_secs(1), worker.run(CancellationToken::new()))
            .await
            .expect("worker should exit once the job channel closes");
    }
}

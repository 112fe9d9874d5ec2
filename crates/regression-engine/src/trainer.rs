//! Cancellable batch gradient descent

use crate::dataset::TrainingSet;
use crate::tools::{compute_cost, dot};
use crate::RegressionError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Lifecycle of a trainer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerState {
    Idle,
    Running,
    Completed,
    Cancelled,
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingOutcome {
    /// All requested iterations ran
    Completed,
    /// Stopped early at an iteration boundary
    Cancelled,
}

/// Progress reported after every iteration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationProgress {
    /// 1-based iteration number
    pub iteration: usize,
    pub total_iterations: usize,
    /// Cost with the theta produced by this iteration
    pub cost: f64,
}

impl IterationProgress {
    pub fn percent_done(&self) -> usize {
        if self.total_iterations == 0 {
            return 100;
        }
        100 * self.iteration / self.total_iterations
    }
}

/// Final result of a run; a cancelled run carries the theta reached so far
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub theta: Vec<f64>,
    pub iterations_completed: usize,
    pub total_iterations: usize,
    pub final_cost: f64,
    pub outcome: TrainingOutcome,
}

/// Event stream of a background run, in iteration order
#[derive(Debug, Clone)]
pub enum TrainingEvent {
    Iteration(IterationProgress),
    Finished(TrainingReport),
}

/// Run gradient descent on the calling thread
///
/// `cancel` is checked once at the top of every iteration.
pub fn descend<F>(
    set: &TrainingSet,
    mut theta: Vec<f64>,
    learning_rate: f64,
    iterations: usize,
    cancel: &AtomicBool,
    mut on_iteration: F,
) -> Result<TrainingReport, RegressionError>
where
    F: FnMut(IterationProgress),
{
    if theta.len() != set.feature_count() {
        return Err(RegressionError::DimensionMismatch {
            context: "theta vs feature row",
            expected: set.feature_count(),
            actual: theta.len(),
        });
    }

    let mut cost = compute_cost(set.x(), set.y(), &theta)?;
    let mut completed = 0;
    let mut outcome = TrainingOutcome::Completed;
    let mut gradient = vec![0.0; theta.len()];

    for iteration in 1..=iterations {
        if cancel.load(Ordering::Acquire) {
            outcome = TrainingOutcome::Cancelled;
            break;
        }

        step(set, &mut theta, &mut gradient, learning_rate);
        cost = compute_cost(set.x(), set.y(), &theta)?;
        completed = iteration;

        on_iteration(IterationProgress {
            iteration,
            total_iterations: iterations,
            cost,
        });
    }

    Ok(TrainingReport {
        theta,
        iterations_completed: completed,
        total_iterations: iterations,
        final_cost: cost,
        outcome,
    })
}

/// One simultaneous update of every theta_j from the previous theta
fn step(set: &TrainingSet, theta: &mut [f64], gradient: &mut [f64], learning_rate: f64) {
    gradient.iter_mut().for_each(|g| *g = 0.0);

    for (row, label) in set.x().iter().zip(set.y()) {
        let error = dot(row, theta) - label;
        for (g, xj) in gradient.iter_mut().zip(row) {
            *g += error * xj;
        }
    }

    let factor = learning_rate / set.len() as f64;
    for (t, g) in theta.iter_mut().zip(gradient.iter()) {
        *t -= factor * g;
    }
}

/// Gradient-descent trainer for the steering model
pub struct GradientDescentTrainer {
    set: Arc<TrainingSet>,
    learning_rate: f64,
    max_iterations: usize,
    theta: Option<Vec<f64>>,
    cancel: Arc<AtomicBool>,
    state: Arc<Mutex<TrainerState>>,
}

impl GradientDescentTrainer {
    /// Create a trainer from a raw design matrix and targets
    pub fn new(
        x: Vec<Vec<f64>>,
        y: Vec<f64>,
        learning_rate: f64,
        max_iterations: usize,
    ) -> Result<Self, RegressionError> {
        Ok(Self::from_set(TrainingSet::new(x, y)?, learning_rate, max_iterations))
    }

    /// Create a trainer over an already validated set
    pub fn from_set(set: TrainingSet, learning_rate: f64, max_iterations: usize) -> Self {
        info!(
            "Creating trainer: {} samples x {} features, rate {}, {} iterations",
            set.len(),
            set.feature_count(),
            learning_rate,
            max_iterations
        );
        Self {
            set: Arc::new(set),
            learning_rate,
            max_iterations,
            theta: None,
            cancel: Arc::new(AtomicBool::new(false)),
            state: Arc::new(Mutex::new(TrainerState::Idle)),
        }
    }

    /// Use `theta` as the starting point
    pub fn set_theta(&mut self, theta: Vec<f64>) -> Result<(), RegressionError> {
        if theta.len() != self.set.feature_count() {
            return Err(RegressionError::DimensionMismatch {
                context: "theta vs feature row",
                expected: self.set.feature_count(),
                actual: theta.len(),
            });
        }
        self.theta = Some(theta);
        Ok(())
    }

    /// Start from all zeros
    pub fn generate_theta(&mut self) {
        self.theta = Some(vec![0.0; self.set.feature_count()]);
    }

    pub fn theta(&self) -> Option<&[f64]> {
        self.theta.as_deref()
    }

    pub fn state(&self) -> TrainerState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Ask a running descent to stop at the next iteration boundary
    pub fn cancel(&self) {
        info!("Cancelling gradient descent");
        self.cancel.store(true, Ordering::Release);
    }

    /// Start descent on a blocking task of the current tokio runtime
    pub fn run(&mut self) -> Result<TrainingRun, RegressionError> {
        let theta = self.theta.clone().ok_or(RegressionError::ThetaNotInitialized)?;
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if *state != TrainerState::Idle {
                return Err(RegressionError::AlreadyStarted);
            }
            *state = TrainerState::Running;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let set = Arc::clone(&self.set);
        let cancel = Arc::clone(&self.cancel);
        let state = Arc::clone(&self.state);
        let learning_rate = self.learning_rate;
        let iterations = self.max_iterations;

        info!("Starting gradient descent ({} iterations)", iterations);

        let task = tokio::task::spawn_blocking(move || {
            let events = tx.clone();
            let result = descend(&set, theta, learning_rate, iterations, &cancel, |progress| {
                debug!(
                    "Iteration {}/{} cost {:.6}",
                    progress.iteration, progress.total_iterations, progress.cost
                );
                // Receiver may be gone; the report is still returned by the task
                let _ = events.send(TrainingEvent::Iteration(progress));
            });

            let final_state = match &result {
                Ok(report) if report.outcome == TrainingOutcome::Cancelled => TrainerState::Cancelled,
                _ => TrainerState::Completed,
            };
            *state.lock().unwrap_or_else(|e| e.into_inner()) = final_state;

            if let Ok(report) = &result {
                info!(
                    "Gradient descent {:?} after {} iterations, cost {:.6}",
                    report.outcome, report.iterations_completed, report.final_cost
                );
                let _ = tx.send(TrainingEvent::Finished(report.clone()));
            }
            result
        });

        Ok(TrainingRun {
            events: rx,
            task,
            cancel: Arc::clone(&self.cancel),
        })
    }
}

/// Handle to a background descent
pub struct TrainingRun {
    events: mpsc::UnboundedReceiver<TrainingEvent>,
    task: JoinHandle<Result<TrainingReport, RegressionError>>,
    cancel: Arc<AtomicBool>,
}

impl TrainingRun {
    /// Request cancellation at the next iteration boundary
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    /// Next event, or None once the run has ended and every event was read
    pub async fn next_event(&mut self) -> Option<TrainingEvent> {
        self.events.recv().await
    }

    /// Feed every event to the callbacks in iteration order, then return the report
    pub async fn deliver<I, C>(
        mut self,
        mut on_iteration: I,
        on_complete: C,
    ) -> Result<TrainingReport, RegressionError>
    where
        I: FnMut(IterationProgress),
        C: FnOnce(&TrainingReport),
    {
        while let Some(event) = self.events.recv().await {
            match event {
                TrainingEvent::Iteration(progress) => on_iteration(progress),
                TrainingEvent::Finished(_) => break,
            }
        }

        let report = self.task.await.map_err(|e| {
            warn!("Training task did not finish: {}", e);
            RegressionError::TaskFailed(e.to_string())
        })??;

        on_complete(&report);
        Ok(report)
    }

    /// Wait for the final report, discarding progress
    pub async fn wait(self) -> Result<TrainingReport, RegressionError> {
        self.deliver(|_| {}, |_| {}).await
    }
}

//! The deployment run state machine.
//!
//! One [`DeploymentOrchestrator::run`] drives a single deployment:
//! start it exactly once, then loop fetching its status until the control
//! plane reports a terminal state, suspending for the configured interval
//! between polls. Progress is emitted through the [`Reporter`] seam; failures
//! surface typed, after the corresponding event has been reported.
//!
//! The inter-poll wait begins after a response lands, so the effective period
//! is fetch latency plus the interval — deliberately not fixed-rate.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{
    DeploymentClient, DeploymentId, DeploymentRequest, DeploymentState, DeploymentStatus,
};
use crate::config::OrchestratorConfig;
use crate::errors::DeployError;
use crate::reporter::{DeploymentEvent, NullReporter, Reporter};

/// Terminal output of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentResult {
    pub id: DeploymentId,
    pub state: DeploymentState,
    /// `completed_at - created_at`, as reported by the control plane.
    pub duration: Duration,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl DeploymentResult {
    /// Build a result from a terminal status.
    ///
    /// A terminal status normally carries `completed_at`; when the control
    /// plane omits it the observation time stands in so the duration stays
    /// well-defined.
    fn from_status(status: &DeploymentStatus) -> Self {
        let end = status.completed_at.unwrap_or_else(Utc::now);
        let duration = (end - status.created_at).to_std().unwrap_or_default();
        Self {
            id: status.id.clone(),
            state: status.state.clone(),
            duration,
            created_at: status.created_at,
            completed_at: status.completed_at,
        }
    }
}

/// Drives a deployment from initiation to a terminal state.
///
/// Each orchestrator owns its client, timer, and event stream; independent
/// runs share no mutable state and may execute concurrently.
pub struct DeploymentOrchestrator<C> {
    client: C,
    config: OrchestratorConfig,
    reporter: Arc<dyn Reporter>,
    cancel: CancellationToken,
}

impl<C: DeploymentClient> DeploymentOrchestrator<C> {
    pub fn new(client: C, config: OrchestratorConfig) -> Self {
        Self {
            client,
            config,
            reporter: Arc::new(NullReporter),
            cancel: CancellationToken::new(),
        }
    }

    /// Attach a reporter for progress events.
    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that aborts this run when cancelled. Cancelling does not touch
    /// the remote deployment; once started it runs to completion on its own.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the deployment to completion.
    ///
    /// Returns the [`DeploymentResult`] on a successful terminal state, or on
    /// any terminal state when `abort_on_failure` is off. All other outcomes
    /// surface as a typed [`DeployError`].
    pub async fn run(&self, request: &DeploymentRequest) -> Result<DeploymentResult, DeployError> {
        match self.config.overall_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.drive(request)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(timeout_secs = limit.as_secs(), "deployment run timed out");
                    Err(DeployError::TimedOut { after: limit })
                }
            },
            None => self.drive(request).await,
        }
    }

    async fn drive(&self, request: &DeploymentRequest) -> Result<DeploymentResult, DeployError> {
        // No retry here: starting a deployment twice risks duplicate side
        // effects on the target fleet.
        let id = self.client.start_deployment(request).await?;
        info!(%id, command = %request.command, "deployment initiated");
        self.reporter.report(&DeploymentEvent::Initiated {
            id: id.clone(),
            check_interval: self.config.check_interval,
        });

        loop {
            if self.cancel.is_cancelled() {
                return Err(DeployError::Cancelled);
            }

            let status = self.client.fetch_status(&id).await?;
            debug!(%id, state = %status.state, "deployment status check");

            if status.state.is_terminal() {
                return self.conclude(status);
            }

            self.reporter
                .report(&DeploymentEvent::StillRunning { id: id.clone() });

            tokio::select! {
                _ = self.cancel.cancelled() => return Err(DeployError::Cancelled),
                _ = tokio::time::sleep(self.config.check_interval) => {}
            }
        }
    }

    fn conclude(&self, status: DeploymentStatus) -> Result<DeploymentResult, DeployError> {
        let result = DeploymentResult::from_status(&status);

        if status.state.is_successful() {
            info!(id = %status.id, duration_secs = result.duration.as_secs(), "deployment successful");
            self.reporter.report(&DeploymentEvent::Completed {
                result: result.clone(),
            });
            return Ok(result);
        }

        warn!(id = %status.id, state = %status.state, "deployment finished unsuccessfully");
        self.reporter.report(&DeploymentEvent::Failed {
            id: status.id.clone(),
            status: status.clone(),
        });

        if self.config.abort_on_failure {
            Err(DeployError::DeploymentFailed {
                id: status.id.clone(),
                status,
            })
        } else {
            Ok(result)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::DeploymentState;
    use crate::errors::TransportError;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn request() -> DeploymentRequest {
        DeploymentRequest {
            stack_id: "s1".into(),
            app_id: "a1".into(),
            command: "deploy".into(),
            args: None,
        }
    }

    fn t0() -> DateTime<Utc> {
        "2024-05-01T10:00:00Z".parse().unwrap()
    }

    fn status(state: DeploymentState, completed: Option<i64>) -> DeploymentStatus {
        DeploymentStatus {
            id: DeploymentId("d1".into()),
            state,
            created_at: t0(),
            completed_at: completed.map(|secs| t0() + chrono::Duration::seconds(secs)),
        }
    }

    fn transport_err() -> TransportError {
        TransportError::Malformed {
            operation: "test",
            message: "boom".into(),
        }
    }

    /// Client double that replays a scripted status sequence and counts calls.
    struct ScriptedClient {
        start: Mutex<Option<Result<DeploymentId, TransportError>>>,
        statuses: Mutex<VecDeque<Result<DeploymentStatus, TransportError>>>,
        start_calls: AtomicU32,
        fetch_calls: AtomicU32,
        cancel_on_first_fetch: Option<CancellationToken>,
    }

    impl ScriptedClient {
        fn new(statuses: Vec<Result<DeploymentStatus, TransportError>>) -> Self {
            Self {
                start: Mutex::new(Some(Ok(DeploymentId("d1".into())))),
                statuses: Mutex::new(statuses.into()),
                start_calls: AtomicU32::new(0),
                fetch_calls: AtomicU32::new(0),
                cancel_on_first_fetch: None,
            }
        }

        fn failing_start() -> Self {
            let client = Self::new(vec![]);
            *client.start.lock().unwrap() = Some(Err(transport_err()));
            client
        }
    }

    #[async_trait::async_trait]
    impl DeploymentClient for &ScriptedClient {
        async fn start_deployment(
            &self,
            _request: &DeploymentRequest,
        ) -> Result<DeploymentId, TransportError> {
            self.start_calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(
                self.fetch_calls.load(Ordering::SeqCst),
                0,
                "start must precede any status fetch"
            );
            self.start
                .lock()
                .unwrap()
                .take()
                .expect("start scripted once")
        }

        async fn fetch_status(
            &self,
            id: &DeploymentId,
        ) -> Result<DeploymentStatus, TransportError> {
            assert_eq!(id.0, "d1");
            let first = self.fetch_calls.fetch_add(1, Ordering::SeqCst) == 0;
            if first && let Some(token) = &self.cancel_on_first_fetch {
                token.cancel();
            }
            self.statuses
                .lock()
                .unwrap()
                .pop_front()
                .expect("fetch called more times than scripted")
        }
    }

    /// Reporter double that records every event.
    #[derive(Default)]
    struct RecordingReporter {
        events: Mutex<Vec<DeploymentEvent>>,
    }

    impl Reporter for RecordingReporter {
        fn report(&self, event: &DeploymentEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    impl RecordingReporter {
        fn completed_count(&self) -> usize {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| matches!(e, DeploymentEvent::Completed { .. }))
                .count()
        }
    }

    fn config(interval_secs: u64) -> OrchestratorConfig {
        OrchestratorConfig {
            check_interval: Duration::from_secs(interval_secs),
            abort_on_failure: true,
            overall_timeout: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn successful_run_counts_fetches_and_sleeps() {
        let client = ScriptedClient::new(vec![
            Ok(status(DeploymentState::Running, None)),
            Ok(status(DeploymentState::Running, None)),
            Ok(status(DeploymentState::Successful, Some(42))),
        ]);
        let reporter = Arc::new(RecordingReporter::default());
        let orchestrator =
            DeploymentOrchestrator::new(&client, config(15)).with_reporter(reporter.clone());

        let before = tokio::time::Instant::now();
        let result = orchestrator.run(&request()).await.unwrap();

        assert_eq!(client.start_calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.fetch_calls.load(Ordering::SeqCst), 3);
        // Two "running" responses, so exactly two 15s suspensions.
        assert_eq!(before.elapsed(), Duration::from_secs(30));

        assert_eq!(result.id.0, "d1");
        assert_eq!(result.state, DeploymentState::Successful);
        assert_eq!(result.duration, Duration::from_secs(42));
        assert_eq!(result.created_at, t0());
        assert_eq!(reporter.completed_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_success_never_sleeps() {
        let client = ScriptedClient::new(vec![Ok(status(DeploymentState::Successful, Some(7)))]);
        let orchestrator = DeploymentOrchestrator::new(&client, config(15));

        let before = tokio::time::Instant::now();
        let result = orchestrator.run(&request()).await.unwrap();

        assert_eq!(client.fetch_calls.load(Ordering::SeqCst), 1);
        assert_eq!(before.elapsed(), Duration::ZERO);
        assert_eq!(result.duration, Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_start_propagates_without_polling() {
        let client = ScriptedClient::failing_start();
        let reporter = Arc::new(RecordingReporter::default());
        let orchestrator =
            DeploymentOrchestrator::new(&client, config(15)).with_reporter(reporter.clone());

        let err = orchestrator.run(&request()).await.unwrap_err();
        assert!(matches!(err, DeployError::Transport(_)));
        assert_eq!(client.fetch_calls.load(Ordering::SeqCst), 0);
        assert!(reporter.events.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fetch_stops_polling() {
        let client = ScriptedClient::new(vec![
            Ok(status(DeploymentState::Running, None)),
            Err(transport_err()),
        ]);
        let orchestrator = DeploymentOrchestrator::new(&client, config(15));

        let err = orchestrator.run(&request()).await.unwrap_err();
        assert!(matches!(err, DeployError::Transport(_)));
        assert_eq!(client.fetch_calls.load(Ordering::SeqCst), 2);
        assert!(client.statuses.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_deployment_aborts_by_default() {
        let client = ScriptedClient::new(vec![
            Ok(status(DeploymentState::Running, None)),
            Ok(status(DeploymentState::Failed, Some(30))),
        ]);
        let reporter = Arc::new(RecordingReporter::default());
        let orchestrator =
            DeploymentOrchestrator::new(&client, config(15)).with_reporter(reporter.clone());

        let err = orchestrator.run(&request()).await.unwrap_err();
        match err {
            DeployError::DeploymentFailed { id, status } => {
                assert_eq!(id.0, "d1");
                assert_eq!(status.state, DeploymentState::Failed);
            }
            other => panic!("Expected DeploymentFailed, got {other:?}"),
        }
        // The failure was reported before the error returned.
        let events = reporter.events.lock().unwrap();
        assert!(matches!(events.last(), Some(DeploymentEvent::Failed { .. })));
        drop(events);
        assert_eq!(reporter.completed_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_deployment_soft_mode_returns_result() {
        let client = ScriptedClient::new(vec![Ok(status(DeploymentState::Failed, Some(30)))]);
        let orchestrator = DeploymentOrchestrator::new(
            &client,
            OrchestratorConfig {
                abort_on_failure: false,
                ..config(15)
            },
        );

        let result = orchestrator.run(&request()).await.unwrap();
        assert_eq!(result.state, DeploymentState::Failed);
        assert_eq!(result.duration, Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn other_terminal_state_treated_as_failure() {
        let client = ScriptedClient::new(vec![Ok(status(
            DeploymentState::Other("rolled_back".into()),
            Some(12),
        ))]);
        let orchestrator = DeploymentOrchestrator::new(&client, config(15));

        let err = orchestrator.run(&request()).await.unwrap_err();
        assert!(matches!(err, DeployError::DeploymentFailed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_between_polls_skips_final_fetch() {
        let mut client = ScriptedClient::new(vec![Ok(status(DeploymentState::Running, None))]);
        let token = CancellationToken::new();
        client.cancel_on_first_fetch = Some(token.clone());

        let orchestrator =
            DeploymentOrchestrator::new(&client, config(15)).with_cancellation(token);

        let err = orchestrator.run(&request()).await.unwrap_err();
        assert!(matches!(err, DeployError::Cancelled));
        assert_eq!(client.fetch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn overall_timeout_bounds_the_run() {
        // Endless "running" responses; the 50s deadline hits during the 4th wait.
        let client = ScriptedClient::new(
            std::iter::repeat_with(|| Ok(status(DeploymentState::Running, None)))
                .take(8)
                .collect(),
        );
        let orchestrator = DeploymentOrchestrator::new(
            &client,
            OrchestratorConfig {
                overall_timeout: Some(Duration::from_secs(50)),
                ..config(15)
            },
        );

        let err = orchestrator.run(&request()).await.unwrap_err();
        match err {
            DeployError::TimedOut { after } => assert_eq!(after, Duration::from_secs(50)),
            other => panic!("Expected TimedOut, got {other:?}"),
        }
        assert_eq!(client.fetch_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_completed_at_still_yields_duration() {
        let client = ScriptedClient::new(vec![Ok(DeploymentStatus {
            id: DeploymentId("d1".into()),
            state: DeploymentState::Successful,
            created_at: Utc::now() - chrono::Duration::seconds(5),
            completed_at: None,
        })]);
        let orchestrator = DeploymentOrchestrator::new(&client, config(15));

        let result = orchestrator.run(&request()).await.unwrap();
        assert!(result.completed_at.is_none());
        assert!(result.duration >= Duration::from_secs(5));
    }
}

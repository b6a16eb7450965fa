use super::{Directive, SessionController};
use crate::error::{AttachError, Result};
use crate::host::{DebugLauncher, Notifier, TaskProvider};
use crate::models::{AttemptOutcome, DebugSession, SessionEvent, TaskExecution};
use crate::orchestrator::{AttachOrchestrator, AttemptTokens};
use futures::stream::{BoxStream, Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

enum Step {
    Shutdown,
    Event(Option<SessionEvent>),
    Outcome(Option<AttemptOutcome>),
}

/// Event loop that ties host session events to attach cycles and the external task.
pub struct WatchAttach {
    controller: SessionController,
    orchestrator: AttachOrchestrator,
    launcher: Arc<dyn DebugLauncher>,
    tasks: Arc<dyn TaskProvider>,
    notifier: Arc<dyn Notifier>,
    tokens: AttemptTokens,
    in_flight: Option<BoxStream<'static, AttemptOutcome>>,
}

impl WatchAttach {
    pub fn new(
        orchestrator: AttachOrchestrator,
        launcher: Arc<dyn DebugLauncher>,
        tasks: Arc<dyn TaskProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            controller: SessionController::new(),
            orchestrator,
            launcher,
            tasks,
            notifier,
            tokens: AttemptTokens::default(),
            in_flight: None,
        }
    }

    /// 在后台任务中消费宿主事件，直到 dispose 或事件流结束
    pub fn spawn<S>(self, events: S) -> WatchAttachHandle
    where
        S: Stream<Item = SessionEvent> + Send + 'static,
    {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(self.run(events, shutdown_rx));
        WatchAttachHandle { shutdown, join }
    }

    pub async fn run<S>(mut self, events: S, mut shutdown: watch::Receiver<bool>)
    where
        S: Stream<Item = SessionEvent> + Send,
    {
        let mut events = Box::pin(events);
        info!("watch attach started");
        loop {
            let step = tokio::select! {
                biased;
                _ = shutdown.changed() => Step::Shutdown,
                event = events.next() => Step::Event(event),
                outcome = next_outcome(&mut self.in_flight) => Step::Outcome(outcome),
            };
            match step {
                Step::Shutdown => {
                    debug!("dispose requested");
                    break;
                }
                Step::Event(Some(event)) => self.on_event(event).await,
                Step::Event(None) => {
                    debug!("host event stream closed");
                    break;
                }
                Step::Outcome(Some(outcome)) => self.on_outcome(outcome),
                Step::Outcome(None) => self.in_flight = None,
            }
        }
        self.cancel_attempts();
        info!("watch attach stopped");
    }

    async fn on_event(&mut self, event: SessionEvent) {
        for directive in self.controller.handle(&event) {
            self.apply(directive).await;
        }
    }

    async fn apply(&mut self, directive: Directive) {
        match directive {
            Directive::Attempt(parent) => {
                // 新周期取代旧周期，旧流连同其等待中的延时一起被丢弃
                let token = self.tokens.issue();
                self.in_flight = Some(self.orchestrator.attempts(parent, token));
            }
            Directive::CancelAttempts => self.cancel_attempts(),
            Directive::StartTask { parent, label } => self.start_external_task(&parent, &label).await,
            Directive::TerminateTask(execution) => self.terminate_task(&execution).await,
        }
    }

    fn on_outcome(&mut self, outcome: AttemptOutcome) {
        match &outcome {
            AttemptOutcome::Failed { reason, failures } => {
                debug!(%reason, failures, "attach attempt failed; retrying");
            }
            AttemptOutcome::Attached => debug!("attach cycle finished"),
            other => debug!(outcome = ?other, "attach cycle ended"),
        }
        if outcome.is_terminal() {
            self.in_flight = None;
        }
    }

    fn cancel_attempts(&mut self) {
        self.tokens.invalidate();
        if self.in_flight.take().is_some() {
            debug!("in-flight attach cycle cancelled");
        }
    }

    async fn start_external_task(&mut self, parent: &DebugSession, label: &str) {
        match self.execute_by_label(label).await {
            Ok(execution) => {
                info!(task = %execution.label, pid = ?execution.pid, "task started");
                if let Some(Directive::TerminateTask(late)) = self.controller.task_started(execution) {
                    self.terminate_task(&late).await;
                }
            }
            Err(e) => {
                let message = match &e {
                    AttachError::TaskNotFound(_) => format!(
                        "Debugger can not be started, task \"{label}\" not found. Check if it is defined in your tasks.json file."
                    ),
                    other => format!("Debugger can not be started, task \"{label}\" failed to start: {other}"),
                };
                error!(task = label, error = %e, "failed to start the configured task");
                self.notifier.show_error(&message);
                if let Err(e) = self.launcher.stop_debugging(parent).await {
                    warn!(error = %e, "failed to stop the host debug session");
                }
            }
        }
    }

    /// 按标签精确匹配
    async fn execute_by_label(&mut self, label: &str) -> Result<TaskExecution> {
        let tasks = self.tasks.fetch_tasks().await?;
        let task = tasks
            .iter()
            .find(|t| t.label == label)
            .ok_or_else(|| AttachError::TaskNotFound(label.to_string()))?;
        self.tasks.execute_task(task).await
    }

    async fn terminate_task(&mut self, execution: &TaskExecution) {
        if let Err(e) = self.tasks.terminate_task(execution).await {
            warn!(task = %execution.label, error = %e, "failed to terminate task");
        }
    }
}

async fn next_outcome(in_flight: &mut Option<BoxStream<'static, AttemptOutcome>>) -> Option<AttemptOutcome> {
    match in_flight {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

/// Handle to a spawned `WatchAttach` loop. Dropping it disposes the loop as well.
#[derive(Debug)]
pub struct WatchAttachHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl WatchAttachHandle {
    /// 停止消费事件并取消进行中的尝试；可重复调用
    pub fn dispose(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_disposed(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// 等待事件循环退出
    pub async fn join(self) {
        if let Err(e) = self.join.await {
            error!(error = %e, "watch attach loop panicked");
        }
    }

    pub async fn shutdown(self) {
        self.dispose();
        self.join().await;
    }
}

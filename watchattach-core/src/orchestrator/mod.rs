//! attach 编排：定位 → 构造请求 → 交给调试子系统，失败按固定间隔重试。

use crate::config::WatchAttachConfig;
use crate::error::{AttachError, Result};
use crate::host::{DebugLauncher, LaunchOptions};
use crate::locator::ProcessLocator;
use crate::models::{AttemptOutcome, DebugSession, ProcessStatus};
use futures::stream::{BoxStream, StreamExt};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

mod request;
mod retry;

pub use request::{AttachRequest, DEFAULT_CONSOLE};
pub use retry::{AttemptState, AttemptToken, AttemptTokens, RetryPolicy};

/// Drives locate → build request → launch, with fixed-delay retry and a failure ceiling.
///
/// Clones share the failure counter, so backoff is global across attach cycles.
#[derive(Clone)]
pub struct AttachOrchestrator {
    locator: ProcessLocator,
    launcher: Arc<dyn DebugLauncher>,
    policy: RetryPolicy,
    state: AttemptState,
}

impl std::fmt::Debug for AttachOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachOrchestrator")
            .field("locator", &self.locator)
            .field("policy", &self.policy)
            .field("failures", &self.state.failures())
            .finish_non_exhaustive()
    }
}

impl AttachOrchestrator {
    pub fn new(locator: ProcessLocator, launcher: Arc<dyn DebugLauncher>, policy: RetryPolicy) -> Self {
        Self {
            locator,
            launcher,
            policy,
            state: AttemptState::default(),
        }
    }

    pub fn state(&self) -> &AttemptState {
        &self.state
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn locator(&self) -> &ProcessLocator {
        &self.locator
    }

    /// 读取配置、定位进程并构造请求，不调用启动器。
    pub async fn prepare(&self, parent: &DebugSession) -> Result<AttachRequest> {
        let config = WatchAttachConfig::from_session(parent)?;
        config.validate()?;

        let status = self.check_running(&config).await;
        if !status.running {
            let what = config.program().unwrap_or("pipeTransport target");
            return Err(AttachError::NotRunning(what.to_string()));
        }
        Ok(AttachRequest::build(&config, &status))
    }

    async fn check_running(&self, config: &WatchAttachConfig) -> ProcessStatus {
        let transport = config.transport();
        match config.program() {
            Some(program) => {
                self.locator
                    .locate(program, transport.as_ref(), config.container())
                    .await
            }
            // 没有程序名时无从探测，完全依赖 transport 寻址
            None => ProcessStatus::running(None),
        }
    }

    /// 单次尝试。被取代的尝试不计入失败次数。
    #[instrument(skip_all, fields(session = %parent.id))]
    pub async fn attempt(&self, parent: &DebugSession, token: &AttemptToken) -> Result<()> {
        let request = match self.prepare(parent).await {
            Ok(request) => request,
            Err(e) => {
                debug!(error = %e, "attach precondition failed");
                return Err(e);
            }
        };
        if !token.is_current() {
            return Err(AttachError::Superseded);
        }

        let target = request.target();
        if request.uses_transport() {
            info!(%target, "attaching via pipeTransport...");
        } else {
            info!(%target, "attaching...");
        }

        let options = LaunchOptions::child_of(parent);
        let accepted = match self.launcher.start_debugging(&request, &options).await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "debug launcher failed");
                false
            }
        };
        if !token.is_current() {
            debug!(%target, accepted, "attempt superseded while launching; result ignored");
            return Err(AttachError::Superseded);
        }

        if !accepted {
            let failures = self.state.record_failure();
            warn!(
                %target,
                failures,
                "the running program check passed but the debugger failed to attach"
            );
            return Err(AttachError::LauncherRejected { target, failures });
        }

        self.state.reset();
        info!(%target, "successfully attached");
        Ok(())
    }

    /// 一个 attach 周期：每次尝试产出一个结果，以终态结束。
    ///
    /// 达到失败上限时只记录一次错误并以 `Exhausted` 结束，不向外传播。
    pub fn attempts(&self, parent: DebugSession, token: AttemptToken) -> BoxStream<'static, AttemptOutcome> {
        let this = self.clone();
        Box::pin(async_stream::stream! {
            loop {
                if !token.is_current() {
                    yield AttemptOutcome::Superseded;
                    break;
                }
                match this.attempt(&parent, &token).await {
                    Ok(()) => {
                        yield AttemptOutcome::Attached;
                        break;
                    }
                    Err(AttachError::Superseded) => {
                        yield AttemptOutcome::Superseded;
                        break;
                    }
                    Err(e) if e.is_retryable() => {
                        let failures = this.state.failures();
                        if this.policy.is_exhausted(failures) {
                            let ceiling = AttachError::RetryCeiling(failures);
                            error!(
                                error = %ceiling,
                                last_error = %e,
                                "attach loop stopped; if you see this, please file an issue"
                            );
                            yield AttemptOutcome::Exhausted { failures };
                            break;
                        }
                        yield AttemptOutcome::Failed { reason: e.to_string(), failures };
                        tokio::time::sleep(this.policy.polling_interval).await;
                    }
                    Err(e) => {
                        error!(error = %e, "attach cycle aborted");
                        yield AttemptOutcome::Aborted { reason: e.to_string() };
                        break;
                    }
                }
            }
        })
    }

    /// 跑完整个周期并返回终态
    pub async fn run_cycle(&self, parent: DebugSession, token: AttemptToken) -> AttemptOutcome {
        let mut outcomes = self.attempts(parent, token);
        let mut last = AttemptOutcome::Superseded;
        while let Some(outcome) = outcomes.next().await {
            last = outcome;
        }
        last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ConsoleMode;
    use crate::locator::Platform;
    use crate::models::{WATCH_ATTACH_AUTO_NAME, WATCH_ATTACH_SESSION_TYPE};
    use crate::testing::{ErrorCounter, FakeLauncher, FakeRunner};
    use tracing_subscriber::layer::SubscriberExt;
    use serde_json::{json, Value};
    use std::time::Duration;

    const RUNNING: &str = "CMD\n/usr/share/dotnet/dotnet watch run\n/src/bin/Debug/net8.0/app\n";

    fn parent(configuration: Value) -> DebugSession {
        DebugSession::new(WATCH_ATTACH_SESSION_TYPE, "Watch", configuration)
    }

    fn orchestrator(
        runner: &Arc<FakeRunner>,
        launcher: &Arc<FakeLauncher>,
        max_failures: u32,
    ) -> AttachOrchestrator {
        let locator = ProcessLocator::new(runner.clone()).with_platform(Platform::Linux);
        let policy = RetryPolicy {
            polling_interval: Duration::from_millis(1),
            max_failures,
        };
        AttachOrchestrator::new(locator, launcher.clone(), policy)
    }

    #[tokio::test]
    async fn not_running_fails_without_calling_launcher() {
        let runner = Arc::new(FakeRunner::default());
        runner.respond("ps -eo cmd", "CMD\n");
        let launcher = Arc::new(FakeLauncher::accepting());
        let orch = orchestrator(&runner, &launcher, 5);
        let token = AttemptTokens::default().issue();

        let err = orch
            .attempt(&parent(json!({ "program": "app" })), &token)
            .await
            .unwrap_err();

        assert!(matches!(err, AttachError::NotRunning(_)));
        assert_eq!(launcher.calls(), 0);
        assert_eq!(orch.state().failures(), 0);
    }

    #[tokio::test]
    async fn success_resets_failure_counter_every_time() {
        let runner = Arc::new(FakeRunner::default());
        runner.respond("ps -eo cmd", RUNNING);
        let launcher = Arc::new(FakeLauncher::accepting());
        let orch = orchestrator(&runner, &launcher, 500);
        let token = AttemptTokens::default().issue();
        let session = parent(json!({ "program": "app" }));

        orch.state().record_failure();
        orch.state().record_failure();
        orch.attempt(&session, &token).await.unwrap();
        assert_eq!(orch.state().failures(), 0);

        orch.state().record_failure();
        orch.attempt(&session, &token).await.unwrap();
        assert_eq!(orch.state().failures(), 0);
        assert_eq!(launcher.calls(), 2);
    }

    #[tokio::test]
    async fn stops_after_exactly_ceiling_launcher_failures() {
        let runner = Arc::new(FakeRunner::default());
        runner.respond("ps -eo cmd", RUNNING);
        let launcher = Arc::new(FakeLauncher::rejecting());
        let orch = orchestrator(&runner, &launcher, 3);
        let token = AttemptTokens::default().issue();

        let outcome = orch.run_cycle(parent(json!({ "program": "app" })), token).await;

        assert_eq!(outcome, AttemptOutcome::Exhausted { failures: 3 });
        assert_eq!(launcher.calls(), 3);

        // 上限已达到：下一轮的第一次失败即终止
        let outcome = orch
            .run_cycle(parent(json!({ "program": "app" })), AttemptTokens::default().issue())
            .await;
        assert_eq!(outcome, AttemptOutcome::Exhausted { failures: 4 });
        assert_eq!(launcher.calls(), 4);
    }

    #[tokio::test]
    async fn attaches_once_process_appears() {
        let runner = Arc::new(FakeRunner::default());
        runner.respond("ps -eo cmd", "CMD\n");
        let launcher = Arc::new(FakeLauncher::accepting());
        let orch = orchestrator(&runner, &launcher, 500);
        let session = parent(json!({ "program": "app" }));
        let mut outcomes = orch.attempts(session.clone(), AttemptTokens::default().issue());

        let first = outcomes.next().await.unwrap();
        assert!(matches!(first, AttemptOutcome::Failed { failures: 0, .. }));
        assert_eq!(launcher.calls(), 0);

        runner.respond("ps -eo cmd", RUNNING);
        assert_eq!(outcomes.next().await, Some(AttemptOutcome::Attached));
        assert_eq!(outcomes.next().await, None);

        let requests = launcher.requests();
        assert_eq!(requests.len(), 1);
        let (request, options) = &requests[0];
        assert_eq!(request.name, WATCH_ATTACH_AUTO_NAME);
        assert_eq!(request.process_name.as_deref(), Some("app"));
        assert_eq!(options.parent_session, session.id);
        assert_eq!(options.console_mode, ConsoleMode::MergeWithParent);
        assert!(options.compact);
    }

    #[tokio::test]
    async fn transport_without_container_never_queries_container() {
        let runner = Arc::new(FakeRunner::default());
        runner.respond("ps -eo cmd", RUNNING);
        let launcher = Arc::new(FakeLauncher::accepting());
        let orch = orchestrator(&runner, &launcher, 5);

        let outcome = orch
            .run_cycle(
                parent(json!({
                    "program": "app",
                    "args": { "pipeTransport": { "pipeProgram": "ssh" } }
                })),
                AttemptTokens::default().issue(),
            )
            .await;

        assert_eq!(outcome, AttemptOutcome::Attached);
        assert!(runner.calls().iter().all(|c| !c.starts_with("docker")));
        let (request, _) = &launcher.requests()[0];
        assert!(request.uses_transport());
        assert_eq!(request.process_id, None);
    }

    #[tokio::test]
    async fn transport_and_container_query_container_table() {
        let runner = Arc::new(FakeRunner::default());
        runner.respond(
            "docker top weather",
            "UID PID PPID C STIME TTY TIME CMD\nroot 31 1 0 09:00 ? 00:00:01 /app/bin/Debug/net8.0/app\n",
        );
        let launcher = Arc::new(FakeLauncher::accepting());
        let orch = orchestrator(&runner, &launcher, 5);

        let outcome = orch
            .run_cycle(
                parent(json!({
                    "program": "app",
                    "containerName": "weather",
                    "pipeTransport": { "pipeProgram": "docker" }
                })),
                AttemptTokens::default().issue(),
            )
            .await;

        assert_eq!(outcome, AttemptOutcome::Attached);
        assert_eq!(runner.calls(), vec!["docker top weather".to_string()]);
    }

    #[tokio::test]
    async fn transport_only_configuration_skips_running_check() {
        let runner = Arc::new(FakeRunner::default());
        let launcher = Arc::new(FakeLauncher::accepting());
        let orch = orchestrator(&runner, &launcher, 5);

        let outcome = orch
            .run_cycle(
                parent(json!({ "pipeTransport": { "pipeProgram": "ssh" } })),
                AttemptTokens::default().issue(),
            )
            .await;

        assert_eq!(outcome, AttemptOutcome::Attached);
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn invalid_configuration_aborts_without_retry() {
        let runner = Arc::new(FakeRunner::default());
        let launcher = Arc::new(FakeLauncher::accepting());
        let orch = orchestrator(&runner, &launcher, 5);

        let outcome = orch
            .run_cycle(parent(json!({ "task": "watch" })), AttemptTokens::default().issue())
            .await;

        assert!(matches!(outcome, AttemptOutcome::Aborted { .. }));
        assert_eq!(launcher.calls(), 0);
    }

    #[tokio::test]
    async fn superseded_token_never_launches() {
        let runner = Arc::new(FakeRunner::default());
        runner.respond("ps -eo cmd", RUNNING);
        let launcher = Arc::new(FakeLauncher::accepting());
        let orch = orchestrator(&runner, &launcher, 5);
        let tokens = AttemptTokens::default();
        let stale = tokens.issue();
        let _current = tokens.issue();

        let outcome = orch.run_cycle(parent(json!({ "program": "app" })), stale).await;

        assert_eq!(outcome, AttemptOutcome::Superseded);
        assert_eq!(launcher.calls(), 0);
    }

    #[tokio::test]
    async fn ceiling_logs_one_error_per_cycle() {
        let errors = ErrorCounter::default();
        let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(errors.clone()));
        let runner = Arc::new(FakeRunner::default());
        runner.respond("ps -eo cmd", RUNNING);
        let launcher = Arc::new(FakeLauncher::rejecting());
        let orch = orchestrator(&runner, &launcher, 3);

        let outcome = orch
            .run_cycle(parent(json!({ "program": "app" })), AttemptTokens::default().issue())
            .await;
        assert_eq!(outcome, AttemptOutcome::Exhausted { failures: 3 });
        assert_eq!(errors.count(), 1);

        orch.run_cycle(parent(json!({ "program": "app" })), AttemptTokens::default().issue())
            .await;
        assert_eq!(errors.count(), 2);
    }

    #[tokio::test]
    async fn retried_rejections_are_not_logged_as_errors() {
        let errors = ErrorCounter::default();
        let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(errors.clone()));
        let runner = Arc::new(FakeRunner::default());
        runner.respond("ps -eo cmd", RUNNING);
        let launcher = Arc::new(FakeLauncher::scripted(&[false, false], true));
        let orch = orchestrator(&runner, &launcher, 5);

        let outcome = orch
            .run_cycle(parent(json!({ "program": "app" })), AttemptTokens::default().issue())
            .await;

        assert_eq!(outcome, AttemptOutcome::Attached);
        assert_eq!(errors.count(), 0);
    }

    #[tokio::test]
    async fn launcher_recovery_after_rejections() {
        let runner = Arc::new(FakeRunner::default());
        runner.respond("ps -eo cmd", RUNNING);
        let launcher = Arc::new(FakeLauncher::scripted(&[false, false], true));
        let orch = orchestrator(&runner, &launcher, 5);

        let outcome = orch
            .run_cycle(parent(json!({ "program": "app" })), AttemptTokens::default().issue())
            .await;

        assert_eq!(outcome, AttemptOutcome::Attached);
        assert_eq!(launcher.calls(), 3);
        assert_eq!(orch.state().failures(), 0);
    }
}

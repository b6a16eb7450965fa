//! 调试子系统：每个被接受的 attach 请求启动一个外部调试器进程。

use super::process::kill_process_tree;
use crate::launch::DebuggerCommand;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex, Notify};
use tracing::{debug, info, warn};
use uuid::Uuid;
use watchattach_core::{
    AttachError, AttachRequest, DebugLauncher, DebugSession, LaunchOptions, Result, SessionEvent,
};

/// 请求 JSON 同时通过该环境变量传给调试器
pub const REQUEST_ENV: &str = "WATCHATTACH_REQUEST";

/// 调试器在此时间内退出视为 attach 被拒绝
const STARTUP_GRACE: Duration = Duration::from_millis(300);

type EventSink = Arc<StdMutex<Option<mpsc::UnboundedSender<SessionEvent>>>>;

struct RunningDebugger {
    pid: Option<u32>,
    stop_requested: Arc<AtomicBool>,
}

pub struct ProcessLauncher {
    debugger: DebuggerCommand,
    events: EventSink,
    children: Arc<Mutex<HashMap<Uuid, RunningDebugger>>>,
    parent_stopped: Arc<Notify>,
    grace: Duration,
}

impl ProcessLauncher {
    pub fn new(debugger: DebuggerCommand, events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            debugger,
            events: Arc::new(StdMutex::new(Some(events))),
            children: Arc::new(Mutex::new(HashMap::new())),
            parent_stopped: Arc::new(Notify::new()),
            grace: STARTUP_GRACE,
        }
    }

    #[cfg(all(test, unix))]
    fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// 父会话被停止（任务缺失或用户中断）时完成
    pub async fn parent_stopped(&self) {
        self.parent_stopped.notified().await;
    }

    /// 不再向事件流投递；已排队的事件仍会被消费
    pub fn close(&self) {
        if let Ok(mut guard) = self.events.lock() {
            guard.take();
        }
    }

    /// 结束全部调试器进程，不产生子会话结束事件
    pub async fn terminate_all(&self) {
        let drained: Vec<RunningDebugger> = {
            let mut children = self.children.lock().await;
            children.drain().map(|(_, running)| running).collect()
        };
        for running in drained {
            stop_debugger(running).await;
        }
    }

    async fn spawn_debugger(&self, request: &AttachRequest, options: &LaunchOptions) -> Result<Option<Child>> {
        let args = self
            .debugger
            .render_args(request, options)
            .map_err(|e| AttachError::Launcher(e.to_string()))?;
        let payload = serde_json::to_string(request)?;

        let mut cmd = Command::new(&self.debugger.command);
        // 宽限期内尝试被取消时 Child 随 future 一起丢弃，进程必须随之结束
        cmd.args(&args)
            .env(REQUEST_ENV, payload)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        for (k, v) in self.debugger.env.iter() {
            cmd.env(k, v);
        }
        let mut child = cmd
            .spawn()
            .map_err(|e| AttachError::Launcher(format!("failed to spawn {}: {e}", self.debugger.command)))?;

        // 启动后立即退出说明 attach 失败
        tokio::time::sleep(self.grace).await;
        if let Ok(Some(status)) = child.try_wait() {
            warn!(?status, "debugger exited immediately");
            return Ok(None);
        }
        Ok(Some(child))
    }

    /// 后台等待调试器退出，非主动停止时上报子会话结束
    fn spawn_wait_handler(&self, mut child: Child, session: DebugSession, stop_requested: Arc<AtomicBool>) {
        let children = self.children.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let status = child.wait().await;
            children.lock().await.remove(&session.id);
            if stop_requested.load(Ordering::SeqCst) {
                debug!(session = %session.id, "debugger stopped on request");
                return;
            }
            info!(session = %session.id, status = ?status.ok(), "debugger exited");
            emit(&events, SessionEvent::Terminated(session));
        });
    }
}

fn emit(events: &EventSink, event: SessionEvent) {
    let sender = events.lock().ok().and_then(|guard| guard.clone());
    match sender {
        Some(tx) => {
            if tx.send(event).is_err() {
                debug!("session event dropped; event loop stopped");
            }
        }
        None => debug!("session event dropped; launcher closed"),
    }
}

async fn stop_debugger(running: RunningDebugger) {
    running.stop_requested.store(true, Ordering::SeqCst);
    if let Some(pid) = running.pid {
        let killed = tokio::task::spawn_blocking(move || kill_process_tree(pid))
            .await
            .unwrap_or(false);
        if !killed {
            warn!(pid, "failed to kill debugger process tree");
        }
    }
}

impl DebugLauncher for ProcessLauncher {
    fn start_debugging<'a>(
        &'a self,
        request: &'a AttachRequest,
        options: &'a LaunchOptions,
    ) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            let Some(child) = self.spawn_debugger(request, options).await? else {
                return Ok(false);
            };
            let session = DebugSession::new(
                request.debugger_type.clone(),
                request.name.clone(),
                serde_json::to_value(request)?,
            );
            let stop_requested = Arc::new(AtomicBool::new(false));
            self.children.lock().await.insert(
                session.id,
                RunningDebugger {
                    pid: child.id(),
                    stop_requested: stop_requested.clone(),
                },
            );
            info!(session = %session.id, pid = ?child.id(), "debugger started");
            self.spawn_wait_handler(child, session, stop_requested);
            Ok(true)
        })
    }

    fn stop_debugging<'a>(&'a self, session: &'a DebugSession) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let child = self.children.lock().await.remove(&session.id);
            if let Some(running) = child {
                stop_debugger(running).await;
                return Ok(());
            }
            // 父会话：结束全部子调试器后上报父会话结束
            self.terminate_all().await;
            emit(&self.events, SessionEvent::Terminated(session.clone()));
            self.parent_stopped.notify_one();
            Ok(())
        })
    }
}

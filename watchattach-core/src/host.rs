//! 宿主侧协作者：调试子系统、任务子系统与用户通知。

use crate::error::Result;
use crate::models::{DebugSession, TaskDefinition, TaskExecution};
use crate::orchestrator::AttachRequest;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where the child session writes its console output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConsoleMode {
    Separate,
    MergeWithParent,
}

/// Options passed along with every attach request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchOptions {
    pub parent_session: Uuid,
    pub console_mode: ConsoleMode,
    pub compact: bool,
}

impl LaunchOptions {
    /// 子会话挂在父会话下，控制台合并、紧凑显示
    pub fn child_of(parent: &DebugSession) -> Self {
        Self {
            parent_session: parent.id,
            console_mode: ConsoleMode::MergeWithParent,
            compact: true,
        }
    }
}

/// The debugging subsystem that actually creates sessions.
pub trait DebugLauncher: Send + Sync {
    /// Returns `Ok(false)` when the host refused to start the session.
    fn start_debugging<'a>(
        &'a self,
        request: &'a AttachRequest,
        options: &'a LaunchOptions,
    ) -> BoxFuture<'a, Result<bool>>;

    /// Stops a session; the host later reports its termination as an event.
    fn stop_debugging<'a>(&'a self, session: &'a DebugSession) -> BoxFuture<'a, Result<()>>;
}

/// The task subsystem: a black box that is started and later terminated.
pub trait TaskProvider: Send + Sync {
    fn fetch_tasks(&self) -> BoxFuture<'_, Result<Vec<TaskDefinition>>>;

    fn execute_task<'a>(&'a self, task: &'a TaskDefinition) -> BoxFuture<'a, Result<TaskExecution>>;

    fn terminate_task<'a>(&'a self, execution: &'a TaskExecution) -> BoxFuture<'a, Result<()>>;
}

/// User-visible notifications.
pub trait Notifier: Send + Sync {
    fn show_error(&self, message: &str);
}

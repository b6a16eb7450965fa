use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Debug session type declared by watch-attach itself (the parent session).
pub const WATCH_ATTACH_SESSION_TYPE: &str = "dotnetcontainerwatchattach";
/// Display name of every auto-created child session.
pub const WATCH_ATTACH_AUTO_NAME: &str = ".NET Watch Attach (Child attach)";
/// Debugger kind requested for child sessions.
pub const CORECLR_DEBUGGER_TYPE: &str = "coreclr";

/// Result of one locator query. Never persisted.
#[skip_serializing_none]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessStatus {
    pub running: bool,
    pub pid: Option<u32>,
}

impl ProcessStatus {
    pub fn not_running() -> Self {
        Self {
            running: false,
            pid: None,
        }
    }

    pub fn running(pid: Option<u32>) -> Self {
        Self { running: true, pid }
    }
}

/// A debug session as reported by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugSession {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub configuration: Value,
    pub started_at: DateTime<Utc>,
}

impl DebugSession {
    pub fn new(kind: impl Into<String>, name: impl Into<String>, configuration: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: kind.into(),
            name: name.into(),
            configuration,
            started_at: Utc::now(),
        }
    }

    /// 由本系统声明的父会话
    pub fn is_watch_attach(&self) -> bool {
        self.kind == WATCH_ATTACH_SESSION_TYPE
    }

    /// 自动创建的子会话只能按名称识别
    pub fn is_auto_attach_child(&self) -> bool {
        self.name == WATCH_ATTACH_AUTO_NAME
    }
}

/// Session notifications delivered by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Started(DebugSession),
    Terminated(DebugSession),
}

/// A task the host knows how to run, matched by exact label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinition {
    pub label: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Handle to a running task execution.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskExecution {
    pub id: Uuid,
    pub label: String,
    pub pid: Option<u32>,
    pub started_at: DateTime<Utc>,
}

impl TaskExecution {
    pub fn new(label: impl Into<String>, pid: Option<u32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            pid,
            started_at: Utc::now(),
        }
    }
}

/// One indication per attach attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// 子会话已创建，失败计数已清零
    Attached,
    /// 瞬时失败，将在轮询间隔后重试
    Failed { reason: String, failures: u32 },
    /// 达到失败上限，本轮终止
    Exhausted { failures: u32 },
    /// 配置错误，不重试
    Aborted { reason: String },
    /// 被更新的尝试取代
    Superseded,
}

impl AttemptOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AttemptOutcome::Failed { .. })
    }
}

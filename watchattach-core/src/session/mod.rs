//! 会话生命周期：父会话启动 → 尝试 attach 并启动任务；子会话结束 → 重新 attach；
//! 父会话结束 → 取消尝试并终止任务。
//!
//! `SessionController` 只做状态转移并产出指令，副作用由 `WatchAttach` 执行。

use crate::config::WatchAttachConfig;
use crate::models::{DebugSession, SessionEvent, TaskExecution};
use tracing::{debug, info, warn};

mod service;

pub use service::{WatchAttach, WatchAttachHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Active,
}

/// Side effect requested by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// 开始新的 attach 周期，取代进行中的周期
    Attempt(DebugSession),
    /// 按标签启动任务，找不到时停止该父会话
    StartTask { parent: DebugSession, label: String },
    CancelAttempts,
    TerminateTask(TaskExecution),
}

/// Tracks the active parent session and the task started with it.
#[derive(Debug, Default)]
pub struct SessionController {
    parent: Option<DebugSession>,
    task: Option<TaskExecution>,
}

impl SessionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LifecycleState {
        if self.parent.is_some() {
            LifecycleState::Active
        } else {
            LifecycleState::Idle
        }
    }

    pub fn parent(&self) -> Option<&DebugSession> {
        self.parent.as_ref()
    }

    pub fn task_execution(&self) -> Option<&TaskExecution> {
        self.task.as_ref()
    }

    pub fn handle(&mut self, event: &SessionEvent) -> Vec<Directive> {
        match event {
            SessionEvent::Started(session) if session.is_watch_attach() => self.on_parent_started(session),
            SessionEvent::Terminated(session) if session.is_watch_attach() => self.on_parent_terminated(),
            SessionEvent::Terminated(session) if session.is_auto_attach_child() => self.on_child_terminated(),
            _ => Vec::new(),
        }
    }

    /// 记录任务句柄。父会话已结束时返回终止指令，任务不应比父会话活得更久。
    pub fn task_started(&mut self, execution: TaskExecution) -> Option<Directive> {
        if self.parent.is_none() {
            warn!(task = %execution.label, "task started after the host session ended; terminating it");
            return Some(Directive::TerminateTask(execution));
        }
        self.task = Some(execution);
        None
    }

    fn on_parent_started(&mut self, session: &DebugSession) -> Vec<Directive> {
        if let Some(previous) = &self.parent {
            warn!(previous = %previous.id, current = %session.id, "another host session started; replacing it");
        }
        info!(session = %session.id, name = %session.name, "host debug session started");
        self.parent = Some(session.clone());

        let mut directives = vec![Directive::Attempt(session.clone())];
        let label = WatchAttachConfig::from_session(session)
            .ok()
            .and_then(|config| config.task().map(str::to_string));
        if let Some(label) = label {
            match &self.task {
                Some(running) => {
                    warn!(task = %running.label, "a task is already running; not starting another one");
                }
                None => directives.push(Directive::StartTask {
                    parent: session.clone(),
                    label,
                }),
            }
        }
        directives
    }

    fn on_child_terminated(&mut self) -> Vec<Directive> {
        match &self.parent {
            Some(parent) => {
                info!("Child debug session terminated, restarting...");
                vec![Directive::Attempt(parent.clone())]
            }
            None => {
                debug!("child session terminated without a host session; ignoring");
                Vec::new()
            }
        }
    }

    fn on_parent_terminated(&mut self) -> Vec<Directive> {
        if self.parent.take().is_none() {
            return Vec::new();
        }
        info!("Host debug session terminated, cleaning up...");
        let mut directives = vec![Directive::CancelAttempts];
        if let Some(task) = self.task.take() {
            info!(task = %task.label, "A task was configured; terminating the task...");
            directives.push(Directive::TerminateTask(task));
        }
        directives
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CORECLR_DEBUGGER_TYPE, WATCH_ATTACH_AUTO_NAME, WATCH_ATTACH_SESSION_TYPE};
    use serde_json::json;

    fn parent_with_task() -> DebugSession {
        DebugSession::new(
            WATCH_ATTACH_SESSION_TYPE,
            "Watch",
            json!({ "program": "app", "task": "watch" }),
        )
    }

    fn child() -> DebugSession {
        DebugSession::new(CORECLR_DEBUGGER_TYPE, WATCH_ATTACH_AUTO_NAME, json!({}))
    }

    #[test]
    fn parent_start_attempts_and_starts_task() {
        let mut controller = SessionController::new();
        let parent = parent_with_task();

        let directives = controller.handle(&SessionEvent::Started(parent.clone()));

        assert_eq!(
            directives,
            vec![
                Directive::Attempt(parent.clone()),
                Directive::StartTask {
                    parent: parent.clone(),
                    label: "watch".into()
                },
            ]
        );
        assert_eq!(controller.state(), LifecycleState::Active);
        assert_eq!(controller.parent(), Some(&parent));
    }

    #[test]
    fn unrelated_sessions_are_ignored() {
        let mut controller = SessionController::new();
        let other = DebugSession::new(CORECLR_DEBUGGER_TYPE, "Launch API", json!({}));
        assert!(controller.handle(&SessionEvent::Started(other.clone())).is_empty());
        assert!(controller.handle(&SessionEvent::Terminated(other)).is_empty());
        assert_eq!(controller.state(), LifecycleState::Idle);
    }

    #[test]
    fn child_termination_reattaches_with_recorded_parent() {
        let mut controller = SessionController::new();
        assert!(controller.handle(&SessionEvent::Terminated(child())).is_empty());

        let parent = parent_with_task();
        controller.handle(&SessionEvent::Started(parent.clone()));
        let directives = controller.handle(&SessionEvent::Terminated(child()));
        assert_eq!(directives, vec![Directive::Attempt(parent)]);
    }

    #[test]
    fn parent_termination_terminates_task_once() {
        let mut controller = SessionController::new();
        let parent = parent_with_task();
        controller.handle(&SessionEvent::Started(parent.clone()));
        let execution = TaskExecution::new("watch", Some(10));
        assert!(controller.task_started(execution.clone()).is_none());
        assert_eq!(controller.task_execution(), Some(&execution));

        let directives = controller.handle(&SessionEvent::Terminated(parent.clone()));
        assert_eq!(
            directives,
            vec![Directive::CancelAttempts, Directive::TerminateTask(execution)]
        );
        assert_eq!(controller.state(), LifecycleState::Idle);
        assert!(controller.task_execution().is_none());

        assert!(controller.handle(&SessionEvent::Terminated(parent)).is_empty());
    }

    #[test]
    fn second_parent_start_does_not_duplicate_task() {
        let mut controller = SessionController::new();
        controller.handle(&SessionEvent::Started(parent_with_task()));
        controller.task_started(TaskExecution::new("watch", None));

        let again = parent_with_task();
        let directives = controller.handle(&SessionEvent::Started(again.clone()));
        assert_eq!(directives, vec![Directive::Attempt(again)]);
    }

    #[test]
    fn late_task_is_terminated_immediately() {
        let mut controller = SessionController::new();
        let execution = TaskExecution::new("watch", Some(11));
        assert_eq!(
            controller.task_started(execution.clone()),
            Some(Directive::TerminateTask(execution))
        );
    }
}

//! 测试替身：脚本化的命令执行器、调试启动器、任务子系统与通知。

use crate::error::{AttachError, Result};
use crate::host::{DebugLauncher, LaunchOptions, Notifier, TaskProvider};
use crate::locator::CommandRunner;
use crate::models::{DebugSession, TaskDefinition, TaskExecution};
use crate::orchestrator::AttachRequest;
use futures::future::BoxFuture;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing_subscriber::layer::{Context, Layer};

fn command_line(program: &str, args: &[String]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{program} {}", args.join(" "))
    }
}

#[derive(Default)]
pub(crate) struct FakeRunner {
    responses: Mutex<HashMap<String, std::result::Result<String, String>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub fn respond(&self, command: &str, output: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(command.to_string(), Ok(output.to_string()));
    }

    pub fn fail(&self, command: &str, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(command.to_string(), Err(message.to_string()));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandRunner for FakeRunner {
    fn run<'a>(&'a self, program: &'a str, args: &'a [String]) -> BoxFuture<'a, Result<String>> {
        let line = command_line(program, args);
        self.calls.lock().unwrap().push(line.clone());
        let response = self.responses.lock().unwrap().get(&line).cloned();
        Box::pin(async move {
            match response {
                Some(Ok(output)) => Ok(output),
                Some(Err(message)) => Err(AttachError::CommandFailed(message)),
                None => Err(AttachError::CommandFailed(format!("no canned output for `{line}`"))),
            }
        })
    }
}

pub(crate) struct FakeLauncher {
    script: Mutex<VecDeque<bool>>,
    fallback: bool,
    requests: Mutex<Vec<(AttachRequest, LaunchOptions)>>,
    stopped: Mutex<Vec<DebugSession>>,
    listener: Mutex<Option<mpsc::UnboundedSender<AttachRequest>>>,
}

impl FakeLauncher {
    pub fn scripted(results: &[bool], fallback: bool) -> Self {
        Self {
            script: Mutex::new(results.iter().copied().collect()),
            fallback,
            requests: Mutex::new(Vec::new()),
            stopped: Mutex::new(Vec::new()),
            listener: Mutex::new(None),
        }
    }

    pub fn accepting() -> Self {
        Self::scripted(&[], true)
    }

    pub fn rejecting() -> Self {
        Self::scripted(&[], false)
    }

    /// 每次 start_debugging 都会把请求推送到返回的接收端
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<AttachRequest> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.listener.lock().unwrap() = Some(tx);
        rx
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<(AttachRequest, LaunchOptions)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn stopped(&self) -> Vec<DebugSession> {
        self.stopped.lock().unwrap().clone()
    }
}

impl DebugLauncher for FakeLauncher {
    fn start_debugging<'a>(
        &'a self,
        request: &'a AttachRequest,
        options: &'a LaunchOptions,
    ) -> BoxFuture<'a, Result<bool>> {
        self.requests
            .lock()
            .unwrap()
            .push((request.clone(), options.clone()));
        if let Some(tx) = self.listener.lock().unwrap().as_ref() {
            let _ = tx.send(request.clone());
        }
        let accepted = self.script.lock().unwrap().pop_front().unwrap_or(self.fallback);
        Box::pin(async move { Ok(accepted) })
    }

    fn stop_debugging<'a>(&'a self, session: &'a DebugSession) -> BoxFuture<'a, Result<()>> {
        self.stopped.lock().unwrap().push(session.clone());
        Box::pin(async { Ok(()) })
    }
}

#[derive(Default)]
pub(crate) struct FakeTasks {
    tasks: Vec<TaskDefinition>,
    executed: Mutex<Vec<TaskExecution>>,
    terminated: Mutex<Vec<TaskExecution>>,
}

impl FakeTasks {
    pub fn with_labels(labels: &[&str]) -> Self {
        Self {
            tasks: labels
                .iter()
                .map(|label| TaskDefinition {
                    label: label.to_string(),
                    command: "dotnet".into(),
                    args: vec!["watch".into(), "run".into()],
                    cwd: None,
                    env: Default::default(),
                })
                .collect(),
            ..Default::default()
        }
    }

    pub fn executed(&self) -> Vec<TaskExecution> {
        self.executed.lock().unwrap().clone()
    }

    pub fn terminated(&self) -> Vec<TaskExecution> {
        self.terminated.lock().unwrap().clone()
    }
}

impl TaskProvider for FakeTasks {
    fn fetch_tasks(&self) -> BoxFuture<'_, Result<Vec<TaskDefinition>>> {
        let tasks = self.tasks.clone();
        Box::pin(async move { Ok(tasks) })
    }

    fn execute_task<'a>(&'a self, task: &'a TaskDefinition) -> BoxFuture<'a, Result<TaskExecution>> {
        let execution = TaskExecution::new(task.label.clone(), Some(4000));
        self.executed.lock().unwrap().push(execution.clone());
        Box::pin(async move { Ok(execution) })
    }

    fn terminate_task<'a>(&'a self, execution: &'a TaskExecution) -> BoxFuture<'a, Result<()>> {
        self.terminated.lock().unwrap().push(execution.clone());
        Box::pin(async { Ok(()) })
    }
}

#[derive(Default)]
pub(crate) struct FakeNotifier {
    errors: Mutex<Vec<String>>,
}

impl FakeNotifier {
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}

impl Notifier for FakeNotifier {
    fn show_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}

/// 统计 ERROR 级别日志条数
#[derive(Clone, Default)]
pub(crate) struct ErrorCounter(Arc<AtomicUsize>);

impl ErrorCounter {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl<S: tracing::Subscriber> Layer<S> for ErrorCounter {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == tracing::Level::ERROR {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

//! Tasks from the launch file, run as child processes of the CLI.

use super::process::kill_process_tree;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;
use watchattach_core::{AttachError, Result, TaskDefinition, TaskExecution, TaskProvider};

const TERMINATE_WAIT: Duration = Duration::from_secs(5);

pub struct CommandTaskProvider {
    tasks: Vec<TaskDefinition>,
    running: Mutex<HashMap<Uuid, Child>>,
}

impl CommandTaskProvider {
    pub fn new(tasks: Vec<TaskDefinition>) -> Self {
        Self {
            tasks,
            running: Mutex::new(HashMap::new()),
        }
    }

    /// 退出前兜底：结束仍在运行的全部任务
    pub async fn terminate_all(&self) {
        let drained: Vec<Child> = {
            let mut running = self.running.lock().await;
            running.drain().map(|(_, child)| child).collect()
        };
        for child in drained {
            stop_child(child).await;
        }
    }
}

/// 未给出 args 时把 command 当作完整命令行拆分
pub fn command_line(task: &TaskDefinition) -> Result<(String, Vec<String>)> {
    if !task.args.is_empty() {
        return Ok((task.command.clone(), task.args.clone()));
    }
    let mut parts = shell_words::split(&task.command)
        .map_err(|e| AttachError::InvalidConfig(format!("task \"{}\": {e}", task.label)))?
        .into_iter();
    let program = parts
        .next()
        .ok_or_else(|| AttachError::InvalidConfig(format!("task \"{}\" has an empty command", task.label)))?;
    Ok((program, parts.collect()))
}

async fn stop_child(mut child: Child) {
    if let Some(pid) = child.id() {
        let killed = tokio::task::spawn_blocking(move || kill_process_tree(pid))
            .await
            .unwrap_or(false);
        if !killed {
            warn!(pid, "failed to kill task process tree");
        }
    } else {
        let _ = child.start_kill();
    }
    match tokio::time::timeout(TERMINATE_WAIT, child.wait()).await {
        Ok(Ok(status)) => debug!(?status, "task exited"),
        Ok(Err(e)) => warn!(error = %e, "failed to wait for task"),
        Err(_) => warn!("task did not exit in time"),
    }
}

impl TaskProvider for CommandTaskProvider {
    fn fetch_tasks(&self) -> BoxFuture<'_, Result<Vec<TaskDefinition>>> {
        Box::pin(async move { Ok(self.tasks.clone()) })
    }

    fn execute_task<'a>(&'a self, task: &'a TaskDefinition) -> BoxFuture<'a, Result<TaskExecution>> {
        Box::pin(async move {
            let (program, args) = command_line(task)?;
            let mut cmd = Command::new(&program);
            cmd.args(&args).stdin(Stdio::null());
            if let Some(cwd) = task.cwd.as_ref() {
                cmd.current_dir(cwd);
            }
            for (k, v) in task.env.iter() {
                cmd.env(k, v);
            }
            let child = cmd.spawn()?;
            let execution = TaskExecution::new(task.label.clone(), child.id());
            info!(task = %task.label, program = %program, pid = ?execution.pid, "task process spawned");
            self.running.lock().await.insert(execution.id, child);
            Ok(execution)
        })
    }

    fn terminate_task<'a>(&'a self, execution: &'a TaskExecution) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let child = self.running.lock().await.remove(&execution.id);
            match child {
                Some(child) => stop_child(child).await,
                None => debug!(task = %execution.label, "task already finished"),
            }
            Ok(())
        })
    }
}

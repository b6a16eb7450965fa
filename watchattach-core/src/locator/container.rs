//! 容器后端：`<container-cli> top <container>`，在输出中按字面匹配程序名。

use super::*;
use tracing::{info, warn};

/// Row of a container process table that matched the program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerProcess {
    /// 来自 PID 列；容器工具不提供时为 None
    pub pid: Option<u32>,
    pub command: String,
}

impl ProcessLocator {
    /// 查询容器进程表并返回匹配行；命令失败视为未找到。
    pub async fn inspect_container(&self, program: &str, container: &str) -> Option<ContainerProcess> {
        let args = vec!["top".to_string(), container.to_string()];
        let output = match self.runner.run(&self.container_cli, &args).await {
            Ok(output) => output,
            Err(e) => {
                warn!(container, error = %e, "failed to check container process");
                return None;
            }
        };
        debug!(container, output = %output, "container process table");
        find_container_process(&output, program)
    }

    pub(super) async fn locate_in_container(&self, program: &str, container: &str) -> ProcessStatus {
        match self.inspect_container(program, container).await {
            Some(process) => {
                info!(container, program, pid = ?process.pid, "container process found");
                // transport 寻址只用进程名
                ProcessStatus::running(None)
            }
            None => ProcessStatus::not_running(),
        }
    }
}

/// 跳过表头逐行字面匹配；表头里有 PID 列时顺带取出该列。
pub(super) fn find_container_process(output: &str, program: &str) -> Option<ContainerProcess> {
    if program.is_empty() {
        return None;
    }
    let mut lines = output.lines().filter(|l| !l.trim().is_empty());
    let header = lines.next()?;
    let pid_column = header.split_whitespace().position(|c| c == "PID");

    lines.find(|line| line.contains(program)).map(|line| {
        let pid = pid_column
            .and_then(|idx| line.split_whitespace().nth(idx))
            .and_then(|token| token.parse::<u32>().ok());
        ContainerProcess {
            pid,
            command: line.trim().to_string(),
        }
    })
}

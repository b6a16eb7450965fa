//! macOS 后端：命令名子串匹配，再用 pid/comm 列表反查 PID。

use super::*;
use tracing::warn;

/// 本地列表里不会出现的可执行文件后缀
const EXECUTABLE_SUFFIX: &str = ".exe";

impl ProcessLocator {
    pub(super) async fn locate_macos(&self, program: &str) -> ProcessStatus {
        let args = vec!["-axco".to_string(), "command".to_string()];
        let listing = match self.runner.run("ps", &args).await {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, "ps failed");
                return ProcessStatus::not_running();
            }
        };
        if !listing.contains(program) {
            return ProcessStatus::not_running();
        }

        let args = vec!["-axco".to_string(), "pid,comm".to_string()];
        let pid = match self.runner.run("ps", &args).await {
            Ok(output) => resolve_pid(&output, program),
            Err(e) => {
                debug!(error = %e, "pid listing failed; falling back to name addressing");
                None
            }
        };
        ProcessStatus::running(pid)
    }
}

/// 在 `PID COMM` 列表中按名称（忽略大小写、容忍 .exe 后缀）查找 PID。
pub(super) fn resolve_pid(listing: &str, program: &str) -> Option<u32> {
    let wanted = program.trim().to_lowercase();
    let short = wanted.strip_suffix(EXECUTABLE_SUFFIX).unwrap_or(wanted.as_str());
    listing.lines().find_map(|line| {
        let line = line.trim();
        let (pid, name) = line.split_once(char::is_whitespace)?;
        let pid = pid.parse::<u32>().ok()?;
        let name = name.trim().to_lowercase();
        (name == wanted || name == short).then_some(pid)
    })
}

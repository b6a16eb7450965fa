//! Linux 后端：`ps -eo cmd`，匹配 dotnet 构建输出路径。

use super::*;
use regex::Regex;
use tracing::warn;

impl ProcessLocator {
    pub(super) async fn locate_linux(&self, program: &str) -> ProcessStatus {
        let args = vec!["-eo".to_string(), "cmd".to_string()];
        match self.runner.run("ps", &args).await {
            Ok(output) => parse_command_lines(&output, program),
            Err(e) => {
                warn!(error = %e, "ps failed");
                ProcessStatus::not_running()
            }
        }
    }
}

/// 形如 `.../bin/Debug/net8.0/<program>` 的命令行；该后端不解析 PID。
pub(super) fn parse_command_lines(output: &str, program: &str) -> ProcessStatus {
    let pattern = format!(r"/bin.*/net.*/{}", regex::escape(program));
    match Regex::new(&pattern) {
        Ok(re) if re.is_match(output) => ProcessStatus::running(None),
        Ok(_) => ProcessStatus::not_running(),
        Err(e) => {
            warn!(error = %e, "invalid process pattern");
            ProcessStatus::not_running()
        }
    }
}

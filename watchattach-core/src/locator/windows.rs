//! Windows 后端：tasklist 按映像名过滤。

use super::*;
use tracing::warn;

/// tasklist 映像名列宽，超长名称会被截断
const IMAGE_NAME_WIDTH: usize = 25;

impl ProcessLocator {
    pub(super) async fn locate_windows(&self, program: &str) -> ProcessStatus {
        let args = vec![
            "-NoProfile".to_string(),
            "tasklist".to_string(),
            "/fi".to_string(),
            format!("\"IMAGENAME eq {program}\""),
        ];
        match self.runner.run("powershell.exe", &args).await {
            Ok(output) => parse_tasklist(&output, program),
            Err(e) => {
                warn!(error = %e, "tasklist failed");
                ProcessStatus::not_running()
            }
        }
    }
}

/// 输出中出现（截断后的）映像名即视为运行中，同一行的下一列是 PID。
pub(super) fn parse_tasklist(output: &str, program: &str) -> ProcessStatus {
    let image: String = program.chars().take(IMAGE_NAME_WIDTH).collect();
    if image.is_empty() || !output.contains(&image) {
        return ProcessStatus::not_running();
    }
    let pid = output.lines().find_map(|line| {
        let idx = line.find(&image)?;
        line[idx + image.len()..]
            .split_whitespace()
            .next()?
            .parse::<u32>()
            .ok()
    });
    ProcessStatus::running(pid)
}

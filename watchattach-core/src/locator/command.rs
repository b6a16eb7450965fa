//! 外部命令执行：进程枚举与容器内省都通过这里，输出按文本返回。

use crate::error::{AttachError, Result};
use futures::future::BoxFuture;
use std::process::Stdio;
use std::time::Duration;

/// Runs an external command synchronously (from the caller's view) and captures its stdout.
pub trait CommandRunner: Send + Sync {
    fn run<'a>(&'a self, program: &'a str, args: &'a [String]) -> BoxFuture<'a, Result<String>>;
}

/// Runs real OS commands, bounded by a timeout so a hung `docker top` cannot stall the loop.
#[derive(Debug, Clone)]
pub struct SystemCommandRunner {
    timeout: Duration,
}

impl SystemCommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl CommandRunner for SystemCommandRunner {
    fn run<'a>(&'a self, program: &'a str, args: &'a [String]) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let mut cmd = tokio::process::Command::new(program);
            cmd.args(args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                // 超时后 future 被丢弃，子进程随之被杀
                .kill_on_drop(true);

            let output = tokio::time::timeout(self.timeout, cmd.output())
                .await
                .map_err(|_| {
                    AttachError::CommandFailed(format!(
                        "{program} timed out after {}ms",
                        self.timeout.as_millis()
                    ))
                })??;

            if !output.status.success() {
                return Err(AttachError::CommandFailed(format!(
                    "{program} exited with {}: {}",
                    output.status,
                    decode_output(&output.stderr).trim()
                )));
            }
            Ok(decode_output(&output.stdout))
        })
    }
}

/// 尝试 UTF-8 解码，否则回退 GB18030（Windows 控制台代码页），最后有损转换。
pub(crate) fn decode_output(raw: &[u8]) -> String {
    match std::str::from_utf8(raw) {
        Ok(v) => v.to_string(),
        Err(_) => {
            let (cow, _, had_errors) = encoding_rs::GB18030.decode(raw);
            if had_errors {
                String::from_utf8_lossy(raw).to_string()
            } else {
                cow.to_string()
            }
        }
    }
}

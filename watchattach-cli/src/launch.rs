//! Launch file: the debug configuration plus the host-side pieces (debugger command, tasks).

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use watchattach_core::{
    AttachRequest, DebugSession, LaunchOptions, TaskDefinition, WatchAttachConfig,
    WATCH_ATTACH_SESSION_TYPE,
};

/// 父会话未命名时使用
pub const DEFAULT_SESSION_NAME: &str = ".NET Watch Attach";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchFile {
    /// 父会话的调试配置（program / task / pipeTransport / containerName / args ...）
    pub configuration: Value,
    #[serde(default)]
    pub debugger: Option<DebuggerCommand>,
    #[serde(default)]
    pub tasks: Vec<TaskDefinition>,
}

impl LaunchFile {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read launch file {}", path.display()))?;
        let file: LaunchFile = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse launch file {}", path.display()))?;
        if !file.configuration.is_object() {
            anyhow::bail!("`configuration` in {} must be an object", path.display());
        }
        Ok(file)
    }

    /// 类型固定为 watch-attach，名称取自配置的 `name`
    pub fn parent_session(&self) -> DebugSession {
        let name = self
            .configuration
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_SESSION_NAME);
        DebugSession::new(WATCH_ATTACH_SESSION_TYPE, name, self.configuration.clone())
    }

    pub fn config(&self) -> anyhow::Result<WatchAttachConfig> {
        let config: WatchAttachConfig = serde_json::from_value(self.configuration.clone())
            .context("invalid debug configuration")?;
        Ok(config)
    }
}

/// External debugger started for every accepted attach request.
///
/// Arguments may contain `{processId}`, `{processName}`, `{request}` and `{parentSession}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebuggerCommand {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl DebuggerCommand {
    pub fn render_args(&self, request: &AttachRequest, options: &LaunchOptions) -> anyhow::Result<Vec<String>> {
        let payload = serde_json::to_string(request)?;
        let parent = options.parent_session.to_string();
        let process_id = request.process_id.as_deref().unwrap_or_default();
        let process_name = request.process_name.as_deref().unwrap_or_default();
        Ok(self
            .args
            .iter()
            .map(|arg| {
                arg.replace("{processId}", process_id)
                    .replace("{processName}", process_name)
                    .replace("{parentSession}", &parent)
                    .replace("{request}", &payload)
            })
            .collect())
    }
}

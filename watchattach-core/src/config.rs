use crate::error::{AttachError, Result};
use crate::models::DebugSession;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_with::skip_serializing_none;
use std::collections::BTreeMap;
use std::time::Duration;

/// 本地路径与远端/容器路径的映射，原样转发
pub type SourceFileMap = BTreeMap<String, String>;

/// 间接连接方式（ssh / docker exec 等），除 presence 外对核心不透明。
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipeTransport {
    #[serde(default)]
    pub pipe_program: Option<String>,
    #[serde(default)]
    pub debugger_path: Option<String>,
    /// pipeArgs / pipeCwd / pipeEnv 等其余字段
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PipeTransport {
    /// 日志用的简短描述
    pub fn describe(&self) -> String {
        match (&self.pipe_program, &self.debugger_path) {
            (Some(program), Some(debugger)) => format!("{program} -> {debugger}"),
            (Some(program), None) => program.clone(),
            (None, Some(debugger)) => debugger.clone(),
            (None, None) => "pipeTransport".to_string(),
        }
    }
}

/// Debug configuration of a watch-attach parent session.
///
/// Known fields are typed; anything else (`type`, `name`, `request`, editor-specific keys) is
/// kept in `extra` so the configuration round-trips unchanged.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchAttachConfig {
    /// Program to attach to, e.g. `weather.exe` for `dotnet watch run weather.csproj`.
    /// Not required when `pipe_transport` is configured.
    #[serde(default)]
    pub program: Option<String>,
    /// Label of the build task started with the session and terminated with it.
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default)]
    pub pipe_transport: Option<PipeTransport>,
    /// Container name or id queried with `<container-cli> top`.
    #[serde(default)]
    pub container_name: Option<String>,
    #[serde(default)]
    pub source_file_map: Option<SourceFileMap>,
    /// Free-form arguments merged into the attach request.
    #[serde(default)]
    pub args: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WatchAttachConfig {
    /// 每次尝试都从父会话重新读取，配置是视图而非副本。
    pub fn from_session(session: &DebugSession) -> Result<Self> {
        serde_json::from_value(session.configuration.clone())
            .map_err(|e| AttachError::InvalidConfig(e.to_string()))
    }

    pub fn program(&self) -> Option<&str> {
        self.program.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }

    pub fn task(&self) -> Option<&str> {
        self.task.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    pub fn container(&self) -> Option<&str> {
        self.container_name
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// 顶层 `pipeTransport` 优先，其次 `args.pipeTransport`。
    pub fn transport(&self) -> Option<PipeTransport> {
        if let Some(transport) = &self.pipe_transport {
            return Some(transport.clone());
        }
        self.arg("pipeTransport")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn has_transport(&self) -> bool {
        self.transport().is_some()
    }

    /// 顶层 `sourceFileMap` 优先，其次 `args.sourceFileMap`。
    pub fn source_file_map(&self) -> Option<SourceFileMap> {
        if let Some(map) = &self.source_file_map {
            return Some(map.clone());
        }
        self.arg("sourceFileMap")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// 至少需要一种寻址方式
    pub fn validate(&self) -> Result<()> {
        if self.program().is_none() && !self.has_transport() {
            return Err(AttachError::InvalidConfig(
                "either `program` or `pipeTransport` must be configured".into(),
            ));
        }
        Ok(())
    }

    fn arg(&self, key: &str) -> Option<&Value> {
        self.args
            .as_ref()
            .and_then(|args| args.get(key))
            .filter(|v| !v.is_null())
    }
}

/// Tunables for the locator and the retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachSettings {
    /// 失败后到下一次重试的固定间隔
    pub polling_interval: Duration,
    /// 连续 attach 失败上限
    pub max_failures: u32,
    /// 外部命令（ps / tasklist / docker top）超时
    pub command_timeout: Duration,
    /// 容器内省命令，默认 docker
    pub container_cli: String,
}

impl Default for AttachSettings {
    fn default() -> Self {
        Self {
            polling_interval: Duration::from_millis(100),
            max_failures: 500,
            command_timeout: Duration::from_secs(5),
            container_cli: "docker".to_string(),
        }
    }
}

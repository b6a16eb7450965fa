//! attach 请求构造：用户参数 → 固定默认值 → 寻址字段。

use crate::config::{PipeTransport, SourceFileMap, WatchAttachConfig};
use crate::models::{ProcessStatus, CORECLR_DEBUGGER_TYPE, WATCH_ATTACH_AUTO_NAME};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_with::skip_serializing_none;

/// 默认控制台输出策略
pub const DEFAULT_CONSOLE: &str = "internalConsole";

/// 由本模块决定的字段，用户 args 中的同名值一律丢弃
const OWNED_KEYS: &[&str] = &[
    "type",
    "request",
    "name",
    "processId",
    "processName",
    "pipeTransport",
    "sourceFileMap",
];

/// The request object handed to the debug subsystem.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachRequest {
    #[serde(rename = "type")]
    pub debugger_type: String,
    pub request: String,
    pub name: String,
    /// 一些宿主要求 PID 以字符串形式传递
    pub process_id: Option<String>,
    pub process_name: Option<String>,
    pub pipe_transport: Option<PipeTransport>,
    pub source_file_map: Option<SourceFileMap>,
    /// false 表示允许单步进入框架代码
    pub just_my_code: bool,
    pub console: String,
    /// Free-form user arguments passed through verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AttachRequest {
    /// 按配置与定位结果构造请求。
    ///
    /// transport 模式只用进程名；本地模式优先 PID，解析不到时退回进程名。
    pub fn build(config: &WatchAttachConfig, status: &ProcessStatus) -> Self {
        let mut extra = config.args.clone().unwrap_or_default();
        for key in OWNED_KEYS {
            extra.remove(*key);
        }

        // 显式配置优先：先看 args，再看顶层配置
        let just_my_code = extra
            .remove("justMyCode")
            .and_then(|v| v.as_bool())
            .or_else(|| config.extra.get("justMyCode").and_then(Value::as_bool))
            .unwrap_or(true);
        let console = extra
            .remove("console")
            .and_then(|v| v.as_str().map(str::to_string))
            .or_else(|| {
                config
                    .extra
                    .get("console")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| DEFAULT_CONSOLE.to_string());

        let transport = config.transport();
        let program = config.program().map(str::to_string);
        let (process_id, process_name) = match (&transport, status.pid) {
            (Some(_), _) => (None, program),
            (None, Some(pid)) => (Some(pid.to_string()), None),
            (None, None) => (None, program),
        };

        Self {
            debugger_type: CORECLR_DEBUGGER_TYPE.to_string(),
            request: "attach".to_string(),
            name: WATCH_ATTACH_AUTO_NAME.to_string(),
            process_id,
            process_name,
            pipe_transport: transport,
            source_file_map: config.source_file_map(),
            just_my_code,
            console,
            extra,
        }
    }

    pub fn uses_transport(&self) -> bool {
        self.pipe_transport.is_some()
    }

    /// 日志里描述 attach 目标
    pub fn target(&self) -> String {
        if let Some(transport) = &self.pipe_transport {
            let name = self.process_name.as_deref().unwrap_or("<any>");
            return format!("{name} via pipeTransport ({})", transport.describe());
        }
        match (&self.process_id, &self.process_name) {
            (Some(pid), _) => format!("pid {pid}"),
            (None, Some(name)) => name.clone(),
            (None, None) => "<unknown>".to_string(),
        }
    }
}

//! 进程定位：判断目标程序是否在运行，并尽量解析出 PID。
//!
//! 本地查询按平台分派到各自的后端（tasklist / ps），容器查询走 `<container-cli> top`。
//! 所有失败都以"未运行"返回，调用方据此进入重试循环。

use crate::config::{AttachSettings, PipeTransport};
use crate::models::ProcessStatus;
use std::sync::Arc;
use tracing::{debug, instrument};

mod command;
mod container;
mod linux;
mod macos;
mod windows;

pub use command::{CommandRunner, SystemCommandRunner};
pub use container::ContainerProcess;

/// Desktop platform whose process-table backend is used for local lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Linux,
    MacOs,
    Unsupported,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Unsupported
        }
    }
}

/// Answers "is this program running, and what is its pid".
#[derive(Clone)]
pub struct ProcessLocator {
    runner: Arc<dyn CommandRunner>,
    platform: Platform,
    container_cli: String,
}

impl std::fmt::Debug for ProcessLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessLocator")
            .field("platform", &self.platform)
            .field("container_cli", &self.container_cli)
            .finish_non_exhaustive()
    }
}

impl ProcessLocator {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            platform: Platform::current(),
            container_cli: AttachSettings::default().container_cli,
        }
    }

    /// 使用真实系统命令，超时与容器命令取自配置
    pub fn system(settings: &AttachSettings) -> Self {
        Self::new(Arc::new(SystemCommandRunner::new(settings.command_timeout)))
            .with_container_cli(settings.container_cli.clone())
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_container_cli(mut self, container_cli: impl Into<String>) -> Self {
        self.container_cli = container_cli.into();
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// 查询进程状态；从不返回错误，失败即"未运行"。
    ///
    /// 只有同时配置了 transport 与容器时才查询容器进程表，
    /// 仅有 transport 时仍按本地进程表判断。
    #[instrument(skip(self, transport))]
    pub async fn locate(
        &self,
        program: &str,
        transport: Option<&PipeTransport>,
        container: Option<&str>,
    ) -> ProcessStatus {
        if program.trim().is_empty() {
            return ProcessStatus::not_running();
        }
        if transport.is_some() {
            if let Some(container) = container.map(str::trim).filter(|c| !c.is_empty()) {
                return self.locate_in_container(program, container).await;
            }
        }
        match self.platform {
            Platform::Windows => self.locate_windows(program).await,
            Platform::Linux => self.locate_linux(program).await,
            Platform::MacOs => self.locate_macos(program).await,
            Platform::Unsupported => {
                debug!("no process backend for this platform");
                ProcessStatus::not_running()
            }
        }
    }
}

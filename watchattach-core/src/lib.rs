//! Core library for watch-attach: process discovery, attach retry orchestration and the
//! parent/child debug session lifecycle.

mod config;
mod error;
mod host;
mod locator;
mod models;
mod orchestrator;
mod session;
#[cfg(test)]
mod testing;

pub use config::{AttachSettings, PipeTransport, SourceFileMap, WatchAttachConfig};
pub use error::{AttachError, Result};
pub use host::{ConsoleMode, DebugLauncher, LaunchOptions, Notifier, TaskProvider};
pub use locator::{CommandRunner, ContainerProcess, Platform, ProcessLocator, SystemCommandRunner};
pub use models::{
    AttemptOutcome, DebugSession, ProcessStatus, SessionEvent, TaskDefinition, TaskExecution,
    CORECLR_DEBUGGER_TYPE, WATCH_ATTACH_AUTO_NAME, WATCH_ATTACH_SESSION_TYPE,
};
pub use orchestrator::{
    AttachOrchestrator, AttachRequest, AttemptState, AttemptToken, AttemptTokens, RetryPolicy,
    DEFAULT_CONSOLE,
};
pub use session::{Directive, LifecycleState, SessionController, WatchAttach, WatchAttachHandle};

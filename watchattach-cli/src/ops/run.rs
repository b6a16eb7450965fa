//! `run`: start the parent session and keep the debugger attached until interrupted.

use super::output::OutputFormat;
use super::ui::{print_header, print_hint, print_info, print_kv, print_kv_optional, print_warning};
use crate::host::{CommandTaskProvider, ConsoleNotifier, ProcessLauncher};
use crate::launch::LaunchFile;
use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{info, warn};
use watchattach_core::{
    AttachOrchestrator, AttachSettings, DebugLauncher, Platform, ProcessLocator, RetryPolicy,
    SessionEvent, WatchAttach,
};

const MACOS_UNTESTED: &str = "macOS support is untested; please report any problems you run into";

pub async fn run_session(settings: &AttachSettings, launch_path: &Path, output: OutputFormat) -> anyhow::Result<()> {
    let launch = LaunchFile::load(launch_path)?;
    let config = launch.config()?;
    config.validate()?;
    let debugger = launch
        .debugger
        .clone()
        .with_context(|| format!("{} has no `debugger` section", launch_path.display()))?;

    let locator = ProcessLocator::system(settings);
    if locator.platform() == Platform::MacOs {
        warn!("{MACOS_UNTESTED}");
    }

    if output == OutputFormat::Table {
        print_header("WATCH ATTACH");
        print_kv_optional("Program", config.program());
        print_kv_optional("Task", config.task());
        print_kv_optional("Container", config.container());
        print_kv_optional("Transport", config.transport().map(|t| t.describe()).as_deref());
        print_kv("Debugger", &debugger.command);
        if locator.platform() == Platform::MacOs {
            print_warning(MACOS_UNTESTED);
        }
        println!();
        print_hint("Press Ctrl+C to stop");
        println!();
    }

    let (events, rx) = mpsc::unbounded_channel();
    let launcher = Arc::new(ProcessLauncher::new(debugger, events.clone()));
    let tasks = Arc::new(CommandTaskProvider::new(launch.tasks.clone()));
    let orchestrator = AttachOrchestrator::new(locator, launcher.clone(), RetryPolicy::from(settings));
    let service = WatchAttach::new(
        orchestrator,
        launcher.clone(),
        tasks.clone(),
        Arc::new(ConsoleNotifier),
    );
    let handle = service.spawn(UnboundedReceiverStream::new(rx));

    let parent = launch.parent_session();
    info!(session = %parent.id, name = %parent.name, "starting host debug session");
    events
        .send(SessionEvent::Started(parent.clone()))
        .context("event loop stopped before the session started")?;
    drop(events);

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl+C")?;
            info!("interrupt received, stopping");
            launcher.stop_debugging(&parent).await?;
        }
        _ = launcher.parent_stopped() => {}
    }

    // 关闭事件源后等待事件循环处理完父会话结束（终止任务）再退出
    launcher.close();
    handle.join().await;
    tasks.terminate_all().await;
    launcher.terminate_all().await;

    if output == OutputFormat::Table {
        print_info("Watch attach stopped.");
    }
    Ok(())
}

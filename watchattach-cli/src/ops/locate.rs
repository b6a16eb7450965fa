//! One-shot process lookup.

use super::output::{print_json, OutputFormat};
use super::ui::{format_running, print_header, print_hint, print_kv, print_kv_optional, print_section};
use serde::Serialize;
use watchattach_core::{AttachSettings, PipeTransport, ProcessLocator, ProcessStatus};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LocateReport {
    program: String,
    platform: String,
    container: Option<String>,
    transport: bool,
    status: ProcessStatus,
    /// 容器进程表中匹配到的行
    container_command: Option<String>,
    container_pid: Option<u32>,
}

pub async fn locate_process(
    settings: &AttachSettings,
    program: &str,
    container: Option<&str>,
    transport: bool,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let locator = ProcessLocator::system(settings);
    let descriptor = transport.then(PipeTransport::default);
    let status = locator.locate(program, descriptor.as_ref(), container).await;

    let row = match (transport, container) {
        (true, Some(container)) if status.running => locator.inspect_container(program, container).await,
        _ => None,
    };

    let report = LocateReport {
        program: program.to_string(),
        platform: format!("{:?}", locator.platform()),
        container: container.map(str::to_string),
        transport,
        status,
        container_pid: row.as_ref().and_then(|r| r.pid),
        container_command: row.map(|r| r.command),
    };

    match output {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            print_header("PROCESS LOOKUP");
            print_kv("Program", &report.program);
            print_kv("Platform", &report.platform);
            print_kv_optional("Container", report.container.as_deref());
            print_kv("Status", &format_running(report.status.running));
            print_kv_optional("PID", report.status.pid.map(|p| p.to_string()).as_deref());
            if let Some(command) = report.container_command.as_deref() {
                print_section("Container process");
                print_kv_optional("PID", report.container_pid.map(|p| p.to_string()).as_deref());
                print_kv("Command", command);
            }
            if container.is_some() && !transport {
                println!();
                print_hint("The container is only queried together with --transport");
            }
        }
    }
    Ok(())
}

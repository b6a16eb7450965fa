//! Dry run: the attach request that would be sent for the current launch file.

use super::output::{print_json, OutputFormat};
use super::ui::{print_header, print_hint, print_kv, print_kv_optional, print_section};
use crate::launch::LaunchFile;
use std::path::Path;
use watchattach_core::{AttachRequest, AttachSettings, ProcessLocator, ProcessStatus};

pub async fn preview_request(
    settings: &AttachSettings,
    launch_path: &Path,
    pid: Option<u32>,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let launch = LaunchFile::load(launch_path)?;
    let config = launch.config()?;
    config.validate()?;

    // 指定 --pid 时跳过探测
    let status = match (pid, config.program()) {
        (Some(pid), _) => ProcessStatus::running(Some(pid)),
        (None, Some(program)) => {
            let transport = config.transport();
            ProcessLocator::system(settings)
                .locate(program, transport.as_ref(), config.container())
                .await
        }
        (None, None) => ProcessStatus::running(None),
    };
    if !status.running {
        anyhow::bail!(
            "application not running: {}",
            config.program().unwrap_or("pipeTransport target")
        );
    }

    let request = AttachRequest::build(&config, &status);
    match output {
        OutputFormat::Json => print_json(&request)?,
        OutputFormat::Table => {
            print_header("ATTACH REQUEST");
            print_kv("Target", &request.target());
            print_kv("Type", &request.debugger_type);
            print_kv_optional("Process ID", request.process_id.as_deref());
            print_kv_optional("Process Name", request.process_name.as_deref());
            print_kv("Just My Code", &request.just_my_code.to_string());
            print_kv("Console", &request.console);
            if let Some(map) = request.source_file_map.as_ref() {
                print_section("Source file map");
                for (remote, local) in map {
                    print_kv(remote, local);
                }
            }
            println!();
            print_hint("Use --output json to see the full request");
        }
    }
    Ok(())
}

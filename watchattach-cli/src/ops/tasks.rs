use super::output::{print_json, OutputFormat};
use super::ui::{print_empty, print_header, print_hint, print_table_header, truncate};
use crate::launch::LaunchFile;
use crossterm::style::Stylize;
use std::path::Path;

/// List tasks declared in the launch file.
pub fn list_tasks(launch_path: &Path, output: OutputFormat) -> anyhow::Result<()> {
    let launch = LaunchFile::load(launch_path)?;
    let configured = launch.config()?.task().map(str::to_string);

    match output {
        OutputFormat::Json => print_json(&launch.tasks)?,
        OutputFormat::Table => {
            print_header("TASKS");
            if launch.tasks.is_empty() {
                print_empty("No tasks declared in the launch file.");
                return Ok(());
            }

            print_table_header(&[("LABEL", 20), ("COMMAND", 40)]);
            for task in &launch.tasks {
                let command = if task.args.is_empty() {
                    task.command.clone()
                } else {
                    format!("{} {}", task.command, task.args.join(" "))
                };
                let label = truncate(&task.label, 20);
                let marker = if configured.as_deref() == Some(task.label.as_str()) {
                    "*".green().to_string()
                } else {
                    " ".to_string()
                };
                println!("  {:<20} {} {}", label.as_str().cyan(), truncate(&command, 40), marker);
            }
            println!();
            if configured.is_some() {
                print_hint("* marks the task started with the debug session");
            }
        }
    }
    Ok(())
}

mod host;
mod launch;
mod ops;

use clap::{Parser, Subcommand};
use ops::{list_tasks, locate_process, preview_request, run_session, LogFormat, OutputFormat};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use watchattach_core::AttachSettings;

/// Keeps a .NET debugger attached to a `dotnet watch` process across restarts.
#[derive(Parser)]
#[command(
    name = "watchattach",
    author,
    version,
    about = "Re-attach a .NET debugger every time dotnet watch restarts the app"
)]
struct Cli {
    /// Launch file with the debug configuration, debugger command and tasks
    #[arg(long, short, env = "WA_CONFIG", default_value = "watchattach.json")]
    config: PathBuf,

    /// Delay between attach attempts, in milliseconds
    #[arg(long, env = "WA_POLL_INTERVAL_MS", default_value_t = 100)]
    poll_interval_ms: u64,

    /// Consecutive attach failures before giving up
    #[arg(long, env = "WA_MAX_FAILURES", default_value_t = 500)]
    max_failures: u32,

    /// Timeout for process table commands (ps / tasklist / docker top), in milliseconds
    #[arg(long, env = "WA_COMMAND_TIMEOUT_MS", default_value_t = 5000)]
    command_timeout_ms: u64,

    /// Container CLI used for `top`
    #[arg(long, env = "WA_CONTAINER_CLI", default_value = "docker")]
    container_cli: String,

    /// Log format
    #[arg(long, value_enum, env = "WA_LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn settings(&self) -> AttachSettings {
        AttachSettings {
            polling_interval: Duration::from_millis(self.poll_interval_ms),
            max_failures: self.max_failures,
            command_timeout: Duration::from_millis(self.command_timeout_ms),
            container_cli: self.container_cli.clone(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start the debug session, its task and the attach loop (Ctrl+C to stop)
    Run,
    /// 查询一次进程状态
    Locate {
        program: String,
        /// 容器名称或 id（需配合 --transport）
        #[arg(long)]
        container: Option<String>,
        /// 按 pipeTransport 模式查询
        #[arg(long, default_value_t = false)]
        transport: bool,
    },
    /// Print the attach request that would be issued
    Request {
        /// 跳过探测，直接使用该 PID
        #[arg(long)]
        pid: Option<u32>,
    },
    /// List tasks declared in the launch file
    Tasks,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载 .env 文件（如果存在），忽略错误
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.log_format);
    let settings = cli.settings();

    match cli.command {
        Commands::Run => run_session(&settings, &cli.config, cli.output).await?,
        Commands::Locate {
            ref program,
            ref container,
            transport,
        } => locate_process(&settings, program, container.as_deref(), transport, cli.output).await?,
        Commands::Request { pid } => preview_request(&settings, &cli.config, pid, cli.output).await?,
        Commands::Tasks => list_tasks(&cli.config, cli.output)?,
    }

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_target(false))
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init(),
    }
}

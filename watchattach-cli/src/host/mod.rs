//! 独立宿主：用子进程扮演调试子系统与任务子系统。

mod launcher;
mod process;
mod tasks;

pub use launcher::ProcessLauncher;
pub use tasks::CommandTaskProvider;

use crate::ops::ui::print_error;
use tracing::error;
use watchattach_core::Notifier;

/// Prints user-facing errors to the terminal.
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn show_error(&self, message: &str) {
        error!("{message}");
        print_error(message);
    }
}

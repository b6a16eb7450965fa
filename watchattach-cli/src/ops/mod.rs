mod locate;
mod output;
mod request;
mod run;
mod tasks;
pub mod ui;

pub use locate::locate_process;
pub use output::{LogFormat, OutputFormat};
pub use request::preview_request;
pub use run::run_session;
pub use tasks::list_tasks;

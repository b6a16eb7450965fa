//! 进程树终止：任务（dotnet watch）与调试器都会派生子进程，必须整棵树一起结束。

use sysinfo::{Pid, System};
use tracing::debug;

/// 强制结束 `pid` 及其全部子进程；进程已不存在时视为成功。
///
/// - Windows: 优先 `taskkill /F /T`
/// - 其余平台: 用 sysinfo 收集父子关系，从叶子节点向上逐一 kill
pub fn kill_process_tree(pid: u32) -> bool {
    if kill_process_tree_native(pid) {
        return true;
    }
    kill_process_tree_fallback(pid)
}

#[cfg(windows)]
fn kill_process_tree_native(pid: u32) -> bool {
    let output = std::process::Command::new("taskkill")
        .args(["/F", "/T", "/PID", &pid.to_string()])
        .output();
    match output {
        Ok(out) => out.status.success(),
        Err(_) => false,
    }
}

#[cfg(not(windows))]
fn kill_process_tree_native(_pid: u32) -> bool {
    // 不按进程组 kill，避免误伤同组的终端会话
    false
}

fn kill_process_tree_fallback(pid: u32) -> bool {
    let mut sys = System::new();
    sys.refresh_processes();

    let mut tree = Vec::new();
    collect_process_tree(&sys, Pid::from(pid as usize), &mut tree);
    if tree.is_empty() {
        return true;
    }

    // 叶子优先
    tree.reverse();
    let mut all_killed = true;
    for member in tree {
        if let Some(process) = sys.process(member) {
            if !process.kill() {
                debug!(pid = %member, "failed to kill process");
                all_killed = false;
            }
        }
    }
    all_killed
}

fn collect_process_tree(sys: &System, pid: Pid, result: &mut Vec<Pid>) {
    if sys.process(pid).is_none() {
        return;
    }
    result.push(pid);
    for (child_pid, process) in sys.processes() {
        if process.parent() == Some(pid) && !result.contains(child_pid) {
            collect_process_tree(sys, *child_pid, result);
        }
    }
}

//! In-task entrypoint used as a rendezvous with the executor.
//!
//! The script prints the first usable interpreter to the task's stdout, then
//! blocks on a FIFO until `cleanup` writes to it.

use drover_model::nomad::Template;

/// Nomad-interpolated path of the entrypoint inside the task.
pub const EXEC_SCRIPT: &str = "${NOMAD_TASK_DIR}/exec_script.sh";

/// Destination of the entrypoint relative to the task directory.
pub const EXEC_SCRIPT_DEST: &str = "local/exec_script.sh";

/// FIFO the entrypoint blocks on.
pub const STOP_FIFO: &str = "/tmp/drover/stop_task";

/// Interpreters tried in order.
pub const SHELL_CANDIDATES: [&str; 7] = [
    "/usr/local/bin/bash",
    "/usr/bin/bash",
    "/bin/bash",
    "/usr/local/bin/sh",
    "/usr/bin/sh",
    "/bin/sh",
    "/busybox/sh",
];

/// Body of the entrypoint script.
pub fn entrypoint_script() -> String {
    let mut script = String::new();
    for (i, shell) in SHELL_CANDIDATES.iter().enumerate() {
        let keyword = if i == 0 { "if" } else { "elif" };
        script.push_str(&format!("{keyword} [ -x {shell} ]; then\n\techo \"{shell}\"\n"));
    }
    script.push_str("else\n\techo \"Could not find compatible shell\" >&2\n\texit 1\nfi\n");
    script.push_str(&format!("mkdir -p {}\n", fifo_dir()));
    script.push_str(&format!("mkfifo {STOP_FIFO}\n"));
    script.push_str(&format!("read _ < {STOP_FIFO}\n"));
    script
}

/// Nomad template that materialises the entrypoint in the task directory.
pub fn entrypoint_template() -> Template {
    Template {
        embedded_tmpl: entrypoint_script(),
        dest_path: EXEC_SCRIPT_DEST.to_string(),
        perms: "755".to_string(),
    }
}

/// Script fed to the discovered shell to unblock the entrypoint.
pub fn stop_command() -> String {
    format!("echo > {STOP_FIFO}\n")
}

fn fifo_dir() -> &'static str {
    STOP_FIFO
        .rsplit_once('/')
        .map_or(STOP_FIFO, |(dir, _)| dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tries_shells_in_preference_order() {
        let script = entrypoint_script();
        let positions: Vec<usize> = SHELL_CANDIDATES
            .iter()
            .map(|s| script.find(&format!("[ -x {s} ]")).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(script.starts_with("if [ -x /usr/local/bin/bash ]"));
    }

    #[test]
    fn prints_nothing_on_stdout_without_a_shell() {
        let script = entrypoint_script();
        assert!(script.contains("echo \"Could not find compatible shell\" >&2\n\texit 1"));
    }

    #[test]
    fn blocks_on_the_stop_fifo() {
        let script = entrypoint_script();
        assert!(script.contains("mkdir -p /tmp/drover\n"));
        assert!(script.contains("mkfifo /tmp/drover/stop_task\n"));
        assert!(script.ends_with("read _ < /tmp/drover/stop_task\n"));
        assert_eq!(stop_command(), "echo > /tmp/drover/stop_task\n");
    }

    #[test]
    fn template_targets_task_local_dir() {
        let t = entrypoint_template();
        assert_eq!(t.dest_path, "local/exec_script.sh");
        assert_eq!(t.perms, "755");
        assert!(EXEC_SCRIPT.ends_with(&t.dest_path["local".len()..]));
    }
}

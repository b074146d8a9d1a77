use std::process::{Command, Output};

use serde_json::Value;

/// Markers that change how `veer` behaves; tests start from none of them.
const MARKERS: &[&str] = &[
    "DEBUG",
    "QUIET",
    "VEER_NO_SUBPROCESS",
    "VEER_SINGULARITY",
    "VEER_CONTAINER_IMAGE",
    "VEER_CONTAINER_APP",
    "VEER_SINGULARITY_BINARY",
    "VEER_INTERPRETER_BINARY",
    "VEER_CONFIG",
    "VEER_PARENT",
    "VEER_ENTRY",
    "VEER_ADDRESS",
];

pub fn veer() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_veer"));
    for marker in MARKERS {
        cmd.env_remove(marker);
    }
    cmd.env("VEER_LOG_LEVEL", "error").arg("--format").arg("json");
    cmd
}

pub fn stdout_json(output: &Output) -> Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(stdout.trim()).unwrap_or_else(|err| {
        panic!(
            "stdout is not JSON ({err}): {stdout}\nstderr: {}",
            String::from_utf8_lossy(&output.stderr)
        )
    })
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

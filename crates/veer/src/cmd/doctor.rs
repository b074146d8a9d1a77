use std::ffi::OsString;
use std::net::SocketAddr;

use serde::Serialize;
use veer_config::{
    Config, Environment, KEY_CONTAINER_BINARY, KEY_CONTAINER_IMAGE, KEY_INTERPRETER_BINARY,
};
use veer_session::{bypass_active, resolve_binary, Launcher, LauncherSpec};
use veer_transport::LoopbackListener;

use crate::cmd::DoctorArgs;
use crate::exit::{CliResult, HEALTH_CHECK_FAILED, SUCCESS};
use crate::output::{print_json, table, OutputFormat};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Pass,
    Fail,
    Warn,
    Info,
    Skip,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    name: String,
    status: CheckStatus,
    detail: String,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorOutput {
    checks: Vec<CheckResult>,
    overall: &'static str,
}

pub fn run(_args: DoctorArgs, format: OutputFormat) -> CliResult<i32> {
    let config = veer_config::global();
    let checks = vec![
        loopback_bind_check(),
        launcher_write_check(),
        interpreter_check(&config),
        container_runtime_check(&config),
        container_image_check(&config),
        config_file_check(),
        bypass_check(&config),
    ];

    let has_fail = checks.iter().any(|c| c.status == CheckStatus::Fail);
    let output = DoctorOutput {
        checks,
        overall: if has_fail { "fail" } else { "pass" },
    };

    print_doctor(&output, format);

    if has_fail {
        Ok(HEALTH_CHECK_FAILED)
    } else {
        Ok(SUCCESS)
    }
}

fn print_doctor(output: &DoctorOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(output),
        OutputFormat::Table => {
            let mut table = table(["CHECK", "STATUS", "DETAIL"]);
            for c in &output.checks {
                table.add_row(vec![
                    c.name.clone(),
                    status_text(c.status).to_string(),
                    c.detail.clone(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("veer doctor\n");
            for c in &output.checks {
                println!(
                    "  [{:>4}] {:<20} {}",
                    status_text(c.status),
                    c.name,
                    c.detail
                );
            }
            if output.overall == "pass" {
                println!("\n  Result: all checks passed");
            } else {
                println!("\n  Result: one or more checks failed");
            }
        }
        OutputFormat::Raw => {
            println!("{}", output.overall);
        }
    }
}

fn status_text(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "PASS",
        CheckStatus::Fail => "FAIL",
        CheckStatus::Warn => "WARN",
        CheckStatus::Info => "INFO",
        CheckStatus::Skip => "SKIP",
    }
}

fn loopback_bind_check() -> CheckResult {
    match LoopbackListener::bind() {
        Ok(listener) => CheckResult::new(
            "loopback_bind",
            CheckStatus::Pass,
            format!("bound {}", listener.local_addr()),
        ),
        Err(err) => CheckResult::new("loopback_bind", CheckStatus::Fail, err.to_string()),
    }
}

fn launcher_write_check() -> CheckResult {
    let address: SocketAddr = ([127, 0, 0, 1], 0).into();
    let program = std::env::current_exe().unwrap_or_default();
    let args: [OsString; 0] = [];
    let dir = std::env::temp_dir();
    let spec = LauncherSpec {
        entry: "doctor",
        address,
        program: &program,
        program_args: &args,
        source_dir: &dir,
    };

    match Launcher::write(&spec) {
        Ok(launcher) => {
            let detail = format!("wrote and removed {}", launcher.path().display());
            launcher.remove();
            CheckResult::new("launcher_write", CheckStatus::Pass, detail)
        }
        Err(err) => CheckResult::new(
            "launcher_write",
            CheckStatus::Fail,
            format!("{}: {err}", dir.display()),
        ),
    }
}

fn interpreter_check(config: &Config) -> CheckResult {
    let name = config
        .get_str(KEY_INTERPRETER_BINARY)
        .unwrap_or_else(|| "sh".to_string());
    match resolve_binary("interpreter", &name) {
        Ok(path) => CheckResult::new("interpreter", CheckStatus::Pass, path.display().to_string()),
        Err(err) => CheckResult::new("interpreter", CheckStatus::Fail, err.to_string()),
    }
}

fn container_runtime_check(config: &Config) -> CheckResult {
    let name = config
        .get_str(KEY_CONTAINER_BINARY)
        .unwrap_or_else(|| "singularity".to_string());
    match resolve_binary("container runtime", &name) {
        Ok(path) => CheckResult::new(
            "container_runtime",
            CheckStatus::Pass,
            path.display().to_string(),
        ),
        // Only containerized calls need it.
        Err(err) => CheckResult::new("container_runtime", CheckStatus::Warn, err.to_string()),
    }
}

fn container_image_check(config: &Config) -> CheckResult {
    let Some(image) = config.get_str(KEY_CONTAINER_IMAGE) else {
        return CheckResult::new("container_image", CheckStatus::Skip, "no default image set");
    };

    if std::path::Path::new(&image).is_file() {
        CheckResult::new("container_image", CheckStatus::Pass, image)
    } else {
        CheckResult::new(
            "container_image",
            CheckStatus::Fail,
            format!("{image} does not exist"),
        )
    }
}

fn config_file_check() -> CheckResult {
    let found = veer_config::candidate_paths(&Environment::Process)
        .into_iter()
        .find(|path| path.is_file());
    match found {
        Some(path) => CheckResult::new("config_file", CheckStatus::Info, path.display().to_string()),
        None => CheckResult::new("config_file", CheckStatus::Info, "none found, using defaults"),
    }
}

fn bypass_check(config: &Config) -> CheckResult {
    if bypass_active(config) {
        CheckResult::new(
            "subprocess_bypass",
            CheckStatus::Warn,
            "DEBUG or VEER_NO_SUBPROCESS set; calls run in-process",
        )
    } else {
        CheckResult::new("subprocess_bypass", CheckStatus::Info, "off")
    }
}

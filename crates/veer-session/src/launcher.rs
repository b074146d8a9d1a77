//! The launcher script run by the child interpreter.
//!
//! The script changes into the source directory and `exec`s the program with
//! the entry name and host address in its environment, so the same program
//! file serves as host and child.

use std::ffi::OsString;
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tracing::{debug, warn};

use crate::{ENV_ADDRESS, ENV_ENTRY};

const SCRIPT_PREFIX: &str = "veer_";
const SCRIPT_SUFFIX: &str = ".sh";

/// Everything the launcher script needs to know.
#[derive(Debug, Clone)]
pub struct LauncherSpec<'a> {
    pub entry: &'a str,
    pub address: SocketAddr,
    pub program: &'a Path,
    pub program_args: &'a [OsString],
    pub source_dir: &'a Path,
}

/// Render the launcher script.
pub fn render_script(spec: &LauncherSpec<'_>) -> String {
    let mut exec_line = format!(
        "{ENV_ENTRY}={} {ENV_ADDRESS}={} exec {}",
        shell_quote(spec.entry),
        shell_quote(&spec.address.to_string()),
        shell_quote(&spec.program.to_string_lossy()),
    );
    for arg in spec.program_args {
        exec_line.push(' ');
        exec_line.push_str(&shell_quote(&arg.to_string_lossy()));
    }

    format!(
        "#!/bin/sh\n# veer launcher for {}\ncd {} || exit 1\n{exec_line}\n",
        spec.entry.replace('\n', " "),
        shell_quote(&spec.source_dir.to_string_lossy()),
    )
}

/// Single-quote `value` for POSIX sh.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// A launcher script on disk.
///
/// The file is removed by [`Launcher::remove`] and, failing that, when the
/// value is dropped.
#[derive(Debug)]
pub struct Launcher {
    path: TempPath,
}

impl Launcher {
    /// Write the script for `spec` to a fresh file in the temp directory.
    pub fn write(spec: &LauncherSpec<'_>) -> io::Result<Self> {
        Self::write_in(&std::env::temp_dir(), spec)
    }

    /// Write the script for `spec` to a fresh file in `dir`.
    pub fn write_in(dir: &Path, spec: &LauncherSpec<'_>) -> io::Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix(SCRIPT_PREFIX)
            .suffix(SCRIPT_SUFFIX)
            .tempfile_in(dir)?;
        file.write_all(render_script(spec).as_bytes())?;
        file.flush()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o755))?;
        }

        let path = file.into_temp_path();
        debug!(path = ?&*path, "wrote launcher script");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the script now. A script that is already gone is fine; other
    /// failures are logged and left to the drop guard.
    pub fn remove(&self) {
        match delete_launcher(&self.path) {
            Ok(true) => debug!(path = ?self.path(), "removed launcher script"),
            Ok(false) => {}
            Err(err) => warn!(path = ?self.path(), error = %err, "could not remove launcher script"),
        }
    }

    /// Give up ownership of the file; it is no longer deleted on drop.
    pub fn keep(self) -> io::Result<PathBuf> {
        self.path.keep().map_err(|err| err.error)
    }
}

/// Delete a launcher script.
///
/// Returns `Ok(false)` if the file did not exist, so calling this twice is
/// harmless.
pub fn delete_launcher(path: &Path) -> io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec<'a>(program: &'a Path, args: &'a [OsString], dir: &'a Path) -> LauncherSpec<'a> {
        LauncherSpec {
            entry: "demo::loopback",
            address: "127.0.0.1:40123".parse().unwrap(),
            program,
            program_args: args,
            source_dir: dir,
        }
    }

    #[test]
    fn script_execs_program_with_markers() {
        let args = [OsString::from("--quiet")];
        let script = render_script(&spec(
            Path::new("/opt/app/bin/sim"),
            &args,
            Path::new("/opt/app/bin"),
        ));

        assert!(script.starts_with("#!/bin/sh\n"));
        assert!(script.contains("cd '/opt/app/bin' || exit 1\n"));
        assert!(script.contains(
            "VEER_ENTRY='demo::loopback' VEER_ADDRESS='127.0.0.1:40123' exec '/opt/app/bin/sim' '--quiet'"
        ));
    }

    #[test]
    fn quotes_are_escaped() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote("$HOME `x`"), "'$HOME `x`'");
    }

    #[test]
    fn write_creates_executable_script() {
        let dir = tempfile::tempdir().unwrap();
        let program = dir.path().join("prog");
        let launcher = Launcher::write_in(dir.path(), &spec(&program, &[], dir.path())).unwrap();

        let name = launcher.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("veer_"));
        assert!(name.ends_with(".sh"));

        let text = std::fs::read_to_string(launcher.path()).unwrap();
        assert!(text.contains("demo::loopback"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(launcher.path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let program = dir.path().join("prog");
        let launcher = Launcher::write_in(dir.path(), &spec(&program, &[], dir.path())).unwrap();
        let path = launcher.path().to_path_buf();

        launcher.remove();
        assert!(!path.exists());
        launcher.remove();
        assert!(!delete_launcher(&path).unwrap());
        drop(launcher);
    }

    #[test]
    fn drop_removes_script() {
        let dir = tempfile::tempdir().unwrap();
        let program = dir.path().join("prog");
        let launcher = Launcher::write_in(dir.path(), &spec(&program, &[], dir.path())).unwrap();
        let path = launcher.path().to_path_buf();

        assert!(path.exists());
        drop(launcher);
        assert!(!path.exists());
    }

    #[test]
    fn keep_survives_drop() {
        let dir = tempfile::tempdir().unwrap();
        let program = dir.path().join("prog");
        let launcher = Launcher::write_in(dir.path(), &spec(&program, &[], dir.path())).unwrap();

        let kept = launcher.keep().unwrap();
        assert!(kept.exists());
        assert!(delete_launcher(&kept).unwrap());
    }
}

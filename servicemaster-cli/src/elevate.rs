//! Restart under an elevation helper

use std::ffi::OsString;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, anyhow};
use servicemaster_core::ElevationRequest;

/// Helpers tried in order
pub const HELPERS: [&str; 3] = ["sudo", "doas", "pkexec"];

pub fn find_helper() -> Option<PathBuf> {
    HELPERS.iter().find_map(|name| which::which(name).ok())
}

/// Arguments that bring the dashboard back with the same theme and scope
pub fn restart_args(exe: &Path, request: &ElevationRequest, demo: bool) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        exe.as_os_str().to_owned(),
        "-w".into(),
        "-c".into(),
        request.theme.clone().into(),
        "--scope".into(),
        request.scope.as_arg().into(),
    ];
    if demo {
        args.push("--demo".into());
    }
    args
}

/// Replace this process with `<helper> <exe> ...`. Returns only on failure.
pub fn exec(helper: &Path, request: &ElevationRequest, demo: bool) -> anyhow::Error {
    let exe = match std::env::current_exe().context("cannot locate the servicemaster binary") {
        Ok(exe) => exe,
        Err(err) => return err,
    };
    tracing::info!(helper = %helper.display(), theme = %request.theme, "restarting elevated");
    let err = Command::new(helper).args(restart_args(&exe, request, demo)).exec();
    anyhow!(err).context(format!("cannot run {}", helper.display()))
}

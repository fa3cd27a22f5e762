//! Unit directory backed by the `systemctl` command
//!
//! Units come from `list-units --all` and `list-unit-files`, both read as
//! JSON. Control requests go out as one `systemctl` invocation each. The
//! periodic refresh lists units through [`fetch_listing`], which runs on the
//! async runtime and hands its records to [`SystemctlDirectory::replace`].

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{Command, Output};

use serde::Deserialize;
use servicemaster_core::directory::{DirectoryError, UnitDirectory};
use servicemaster_core::unit::{Scope, UnitOp, UnitRecord};
use tracing::{debug, info, warn};

const LIST_UNITS: [&str; 4] = ["list-units", "--all", "--output=json", "--no-pager"];

const LIST_UNIT_FILES: [&str; 3] = ["list-unit-files", "--output=json", "--no-pager"];

/// One entry of `systemctl list-units --output=json`
#[derive(Debug, Deserialize)]
struct ListedUnit {
    unit: String,
    #[serde(default)]
    load: String,
    #[serde(default)]
    active: String,
    #[serde(default)]
    sub: String,
    #[serde(default)]
    description: String,
}

/// One entry of `systemctl list-unit-files --output=json`
#[derive(Debug, Deserialize)]
struct ListedUnitFile {
    unit_file: String,
    state: String,
}

/// What changed between two listings
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Refresh {
    Unchanged,
    /// Same units in the same order; these changed state
    Changed(Vec<String>),
    /// Units appeared, vanished or moved
    Restructured,
}

fn parse_units(json: &str) -> Result<Vec<ListedUnit>, DirectoryError> {
    serde_json::from_str(json)
        .map_err(|e| DirectoryError::Other(format!("bad list-units output: {e}")))
}

fn parse_unit_files(json: &str) -> Result<Vec<ListedUnitFile>, DirectoryError> {
    serde_json::from_str(json)
        .map_err(|e| DirectoryError::Other(format!("bad list-unit-files output: {e}")))
}

/// Join loaded units with unit file states. Unit files that are not loaded
/// are listed as inactive; templates and unknown suffixes are skipped.
fn merge(units: Vec<ListedUnit>, files: Vec<ListedUnitFile>) -> Vec<UnitRecord> {
    let mut states: HashMap<String, String> =
        files.into_iter().map(|f| (file_name(&f.unit_file), f.state)).collect();

    let mut records: Vec<UnitRecord> = units
        .into_iter()
        .filter_map(|u| {
            let enable_state = states.remove(&u.unit);
            UnitRecord::new(u.unit, u.load, enable_state, u.active, u.sub, u.description)
        })
        .collect();

    records.extend(
        states
            .into_iter()
            .filter(|(name, _)| !name.contains("@."))
            .filter_map(|(name, state)| {
                UnitRecord::new(name, "not-loaded", Some(state), "inactive", "dead", "")
            }),
    );
    records.sort_by(|a, b| a.name.cmp(&b.name));
    records
}

/// `list-unit-files` may report full paths on older systemd versions
fn file_name(unit_file: &str) -> String {
    unit_file.rsplit('/').next().unwrap_or(unit_file).to_string()
}

fn compare(old: &[UnitRecord], new: &[UnitRecord]) -> Refresh {
    if old.len() != new.len() || old.iter().zip(new).any(|(a, b)| a.name != b.name) {
        return Refresh::Restructured;
    }
    let changed: Vec<String> = old
        .iter()
        .zip(new)
        .filter(|(a, b)| a != b)
        .map(|(_, b)| b.name.clone())
        .collect();
    if changed.is_empty() {
        Refresh::Unchanged
    } else {
        Refresh::Changed(changed)
    }
}

/// Whether a per-user manager is running for `uid`
fn user_manager_running(uid: u32) -> bool {
    let runtime = std::env::var_os("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(format!("/run/user/{uid}")));
    runtime.join("systemd").is_dir()
}

fn failure_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.is_empty() {
        format!("exited with {}", output.status)
    } else {
        stderr
    }
}

fn stdout_of(output: Output) -> Result<String, DirectoryError> {
    if !output.status.success() {
        return Err(DirectoryError::Other(failure_message(&output)));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

async fn query_async(scope: Scope, args: &[&str]) -> Result<String, DirectoryError> {
    debug!(scope = scope.as_arg(), ?args, "systemctl (async)");
    let mut cmd = tokio::process::Command::new("systemctl");
    if scope == Scope::User {
        cmd.arg("--user");
    }
    let output = cmd
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| DirectoryError::Other(format!("cannot run systemctl: {e}")))?;
    stdout_of(output)
}

/// List the units of `scope` without blocking the runtime
pub async fn fetch_listing(scope: Scope) -> Result<Vec<UnitRecord>, DirectoryError> {
    let units = parse_units(&query_async(scope, &LIST_UNITS).await?)?;
    let files = parse_unit_files(&query_async(scope, &LIST_UNIT_FILES).await?)?;
    Ok(merge(units, files))
}

pub struct SystemctlDirectory {
    scope: Scope,
    units: Vec<UnitRecord>,
    system_only: bool,
}

impl SystemctlDirectory {
    pub fn new(scope: Scope, uid: u32) -> Result<Self, DirectoryError> {
        let system_only = !user_manager_running(uid);
        if system_only {
            info!(uid, "no user manager found, system units only");
        }
        let scope = if system_only { Scope::System } else { scope };
        let mut dir = Self {
            scope,
            units: Vec::new(),
            system_only,
        };
        dir.reload()?;
        Ok(dir)
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("systemctl");
        if self.scope == Scope::User {
            cmd.arg("--user");
        }
        cmd
    }

    fn run(&self, args: &[&str]) -> Result<Output, DirectoryError> {
        debug!(scope = self.scope.as_arg(), ?args, "systemctl");
        self.command()
            .args(args)
            .output()
            .map_err(|e| DirectoryError::Other(format!("cannot run systemctl: {e}")))
    }

    fn query(&self, args: &[&str]) -> Result<String, DirectoryError> {
        stdout_of(self.run(args)?)
    }

    fn fetch(&self) -> Result<Vec<UnitRecord>, DirectoryError> {
        let units = parse_units(&self.query(&LIST_UNITS)?)?;
        let files = parse_unit_files(&self.query(&LIST_UNIT_FILES)?)?;
        Ok(merge(units, files))
    }

    /// List the units again and report what changed
    pub fn reload(&mut self) -> Result<Refresh, DirectoryError> {
        let fresh = self.fetch()?;
        Ok(self.install(fresh))
    }

    /// Take a listing fetched for `scope`. A listing for a scope that is no
    /// longer shown is dropped.
    pub fn replace(&mut self, scope: Scope, fresh: Vec<UnitRecord>) -> Refresh {
        if scope != self.scope {
            debug!(listed = scope.as_arg(), shown = self.scope.as_arg(), "stale listing dropped");
            return Refresh::Unchanged;
        }
        self.install(fresh)
    }

    fn install(&mut self, fresh: Vec<UnitRecord>) -> Refresh {
        let refresh = compare(&self.units, &fresh);
        self.units = fresh;
        refresh
    }
}

impl UnitDirectory for SystemctlDirectory {
    fn nth(&self, index: usize) -> Option<&UnitRecord> {
        self.units.get(index)
    }

    fn len(&self) -> usize {
        self.units.len()
    }

    fn operation(&mut self, name: &str, op: UnitOp) -> Result<(), DirectoryError> {
        if !self.units.iter().any(|u| u.name == name) {
            return Err(DirectoryError::UnitNotFound { name: name.into() });
        }
        let output = if op.changes_unit_file() {
            self.run(&[op.verb(), name])?
        } else {
            self.run(&["--no-block", op.verb(), name])?
        };
        if !output.status.success() {
            return Err(DirectoryError::OperationFailed {
                name: name.into(),
                op: op.verb(),
                message: failure_message(&output),
            });
        }
        info!(op = op.verb(), unit = name, "systemctl accepted request");
        Ok(())
    }

    fn status_text(&self, name: &str) -> Option<String> {
        // Non-zero exit is normal for inactive units
        let output = self.run(&["status", "--no-pager", "--", name]).ok()?;
        let text = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
        (!text.is_empty()).then_some(text)
    }

    fn refresh_enable_state(&mut self, name: &str) -> Result<(), DirectoryError> {
        let output = self.run(&["is-enabled", "--", name])?;
        let state = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let unit = self
            .units
            .iter_mut()
            .find(|u| u.name == name)
            .ok_or_else(|| DirectoryError::UnitNotFound { name: name.into() })?;
        unit.enable_state = (!state.is_empty()).then_some(state);
        Ok(())
    }

    fn scope_is_system_only(&self) -> bool {
        self.system_only
    }

    fn switch_scope(&mut self, scope: Scope) -> Result<(), DirectoryError> {
        if scope == Scope::User && self.system_only {
            return Err(DirectoryError::ScopeUnavailable {
                scope: scope.as_arg(),
            });
        }
        let previous = self.scope;
        self.scope = scope;
        if let Err(err) = self.reload() {
            warn!(%err, scope = scope.as_arg(), "listing failed, keeping previous scope");
            self.scope = previous;
            return Err(err);
        }
        Ok(())
    }

    fn scope(&self) -> Scope {
        self.scope
    }
}

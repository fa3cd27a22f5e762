//! Unit directory trait
//!
//! The unit directory is the external source of truth for the unit list and the
//! only place control requests go. Different implementations talk to systemd in
//! different ways:
//! - `MemoryDirectory`: an in-memory list for demos and tests
//! - `SystemctlDirectory` (cli): shells out to `systemctl`

use thiserror::Error;

use crate::unit::{Scope, UnitCategory, UnitOp, UnitRecord};

/// Errors reported by a unit directory
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("unit not found: {name}")]
    UnitNotFound { name: String },
    #[error("{op} failed for {name}: {message}")]
    OperationFailed {
        name: String,
        op: &'static str,
        message: String,
    },
    #[error("{scope} units are not reachable from this process")]
    ScopeUnavailable { scope: &'static str },
    #[error("{0}")]
    Other(String),
}

/// The unit directory interface consumed by the dashboard.
///
/// The list behind `nth` must stay stable for the duration of one redraw;
/// it may change freely between two calls into the dashboard.
pub trait UnitDirectory {
    /// Ordinal access into the current unit list
    fn nth(&self, index: usize) -> Option<&UnitRecord>;

    /// Number of units, counted through `nth`
    fn len(&self) -> usize {
        let mut n = 0;
        while self.nth(n).is_some() {
            n += 1;
        }
        n
    }

    fn is_empty(&self) -> bool {
        self.nth(0).is_none()
    }

    /// Run a mutating operation on the named unit
    fn operation(&mut self, name: &str, op: UnitOp) -> Result<(), DirectoryError>;

    /// Human-readable multi-line status for the named unit
    fn status_text(&self, name: &str) -> Option<String>;

    /// Re-query the unit file state after enable/disable/mask/unmask
    fn refresh_enable_state(&mut self, name: &str) -> Result<(), DirectoryError>;

    /// True when only the system manager is reachable
    fn scope_is_system_only(&self) -> bool;

    /// Point the directory at another service manager
    fn switch_scope(&mut self, scope: Scope) -> Result<(), DirectoryError>;

    fn scope(&self) -> Scope;
}

/// Iterate over every unit of a directory in its current order
pub fn units(dir: &dyn UnitDirectory) -> impl Iterator<Item = &UnitRecord> + '_ {
    (0..).map_while(move |i| dir.nth(i))
}

/// Find a unit by name
pub fn find_unit<'a>(dir: &'a dyn UnitDirectory, name: &str) -> Option<&'a UnitRecord> {
    units(dir).find(|u| u.name == name)
}

/// In-memory unit directory.
///
/// Holds separate system and user lists, applies operations by rewriting the
/// record's states, and keeps a log of every operation it received.
#[derive(Clone, Debug, Default)]
pub struct MemoryDirectory {
    system: Vec<UnitRecord>,
    user: Vec<UnitRecord>,
    scope: Scope,
    system_only: bool,
    failing: Vec<String>,
    calls: Vec<(String, UnitOp)>,
}

impl MemoryDirectory {
    pub fn new(system: Vec<UnitRecord>, user: Vec<UnitRecord>) -> Self {
        Self {
            system,
            user,
            ..Default::default()
        }
    }

    /// Only the system list is reachable
    pub fn with_system_only(mut self, system_only: bool) -> Self {
        self.system_only = system_only;
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Make every operation on `name` fail
    pub fn with_failing_unit(mut self, name: &str) -> Self {
        self.failing.push(name.to_string());
        self
    }

    /// Operations received so far, in order
    pub fn calls(&self) -> &[(String, UnitOp)] {
        &self.calls
    }

    /// Mutable access to the list of the current scope
    pub fn units_mut(&mut self) -> &mut Vec<UnitRecord> {
        match self.scope {
            Scope::System => &mut self.system,
            Scope::User => &mut self.user,
        }
    }

    fn list(&self) -> &[UnitRecord] {
        match self.scope {
            Scope::System => &self.system,
            Scope::User => &self.user,
        }
    }

    /// A small, plausible unit list used by `--demo`
    pub fn demo() -> Self {
        let sys = [
            ("sshd.service", "enabled", "active", "running", "OpenSSH Daemon"),
            ("cups.service", "disabled", "inactive", "dead", "CUPS Scheduler"),
            ("cups.socket", "enabled", "active", "listening", "CUPS Scheduler"),
            ("NetworkManager.service", "enabled", "active", "running", "Network Manager"),
            ("systemd-journald.service", "static", "active", "running", "Journal Service"),
            ("systemd-timesyncd.service", "enabled", "active", "running", "Network Time Synchronization"),
            ("bluetooth.service", "masked", "inactive", "dead", "Bluetooth service"),
            ("docker.service", "disabled", "failed", "failed", "Docker Application Container Engine"),
            ("fstrim.timer", "enabled", "active", "waiting", "Discard unused filesystem blocks once a week"),
            ("logrotate.timer", "enabled", "active", "waiting", "Daily rotation of log files"),
            ("multi-user.target", "static", "active", "active", "Multi-User System"),
            ("graphical.target", "static", "active", "active", "Graphical Interface"),
            ("home.mount", "generated", "active", "mounted", "/home"),
            ("tmp.mount", "static", "active", "mounted", "Temporary Directory /tmp"),
            ("dev-sda1.device", "", "active", "plugged", "Samsung SSD 870 EVO 1"),
            ("system.slice", "", "active", "active", "System Slice"),
            ("dev-zram0.swap", "", "active", "active", "Compressed Swap on /dev/zram0"),
            ("session-2.scope", "", "active", "running", "Session 2 of User demo"),
            ("cups.path", "enabled", "active", "waiting", "CUPS Scheduler"),
            ("proc-sys-fs-binfmt_misc.automount", "static", "active", "waiting", "Arbitrary Executable File Formats File System Automount Point"),
        ];
        let user = [
            ("pipewire.service", "enabled", "active", "running", "PipeWire Multimedia Service"),
            ("pipewire.socket", "enabled", "active", "running", "PipeWire Multimedia System Sockets"),
            ("syncthing.service", "disabled", "inactive", "dead", "Syncthing - Open Source Continuous File Synchronization"),
            ("default.target", "static", "active", "active", "Main User Target"),
        ];
        let build = |rows: &[(&str, &str, &str, &str, &str)]| {
            rows.iter()
                .filter_map(|(name, state, active, sub, desc)| {
                    let enable = (!state.is_empty()).then(|| state.to_string());
                    UnitRecord::new(*name, "loaded", enable, *active, *sub, *desc)
                })
                .collect::<Vec<_>>()
        };
        Self::new(build(&sys), build(&user))
    }
}

impl UnitDirectory for MemoryDirectory {
    fn nth(&self, index: usize) -> Option<&UnitRecord> {
        self.list().get(index)
    }

    fn len(&self) -> usize {
        self.list().len()
    }

    fn operation(&mut self, name: &str, op: UnitOp) -> Result<(), DirectoryError> {
        self.calls.push((name.to_string(), op));
        if self.failing.iter().any(|f| f == name) {
            return Err(DirectoryError::OperationFailed {
                name: name.to_string(),
                op: op.verb(),
                message: "simulated failure".into(),
            });
        }
        let unit = self
            .units_mut()
            .iter_mut()
            .find(|u| u.name == name)
            .ok_or_else(|| DirectoryError::UnitNotFound {
                name: name.to_string(),
            })?;

        let running_sub = match unit.category {
            UnitCategory::Socket => "listening",
            UnitCategory::Timer | UnitCategory::Path => "waiting",
            UnitCategory::Mount => "mounted",
            UnitCategory::Service | UnitCategory::Scope => "running",
            _ => "active",
        };
        match op {
            UnitOp::Start | UnitOp::Restart | UnitOp::Reload => {
                unit.active = "active".into();
                unit.sub = running_sub.into();
            }
            UnitOp::Stop => {
                unit.active = "inactive".into();
                unit.sub = "dead".into();
            }
            // Unit file changes only become visible after refresh_enable_state
            UnitOp::Enable | UnitOp::Disable | UnitOp::Mask | UnitOp::Unmask => {}
        }
        Ok(())
    }

    fn status_text(&self, name: &str) -> Option<String> {
        let unit = self.list().iter().find(|u| u.name == name)?;
        Some(format!(
            "● {} - {}\n     Loaded: {} ({})\n     Active: {} ({})",
            unit.name,
            unit.description,
            unit.load,
            unit.display_state(),
            unit.active,
            unit.sub
        ))
    }

    fn refresh_enable_state(&mut self, name: &str) -> Result<(), DirectoryError> {
        let last_op = self
            .calls
            .iter()
            .rev()
            .find(|(n, op)| n == name && op.changes_unit_file())
            .map(|(_, op)| *op);
        let unit = self
            .units_mut()
            .iter_mut()
            .find(|u| u.name == name)
            .ok_or_else(|| DirectoryError::UnitNotFound {
                name: name.to_string(),
            })?;
        if let Some(op) = last_op {
            let state = match op {
                UnitOp::Enable => "enabled",
                UnitOp::Mask => "masked",
                _ => "disabled",
            };
            unit.enable_state = Some(state.into());
        }
        Ok(())
    }

    fn scope_is_system_only(&self) -> bool {
        self.system_only
    }

    fn switch_scope(&mut self, scope: Scope) -> Result<(), DirectoryError> {
        if scope == Scope::User && self.system_only {
            return Err(DirectoryError::ScopeUnavailable { scope: "user" });
        }
        self.scope = scope;
        Ok(())
    }

    fn scope(&self) -> Scope {
        self.scope
    }
}

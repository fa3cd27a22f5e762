//! Privilege gate for mutating unit operations
//!
//! System units can only be changed by an elevated process. The check is
//! local and runs before anything is sent to the unit directory.

use tracing::{info, warn};

use crate::directory::{DirectoryError, UnitDirectory};
use crate::unit::{Scope, UnitOp};

/// Shown when a system-scope operation is refused
pub const PRIVILEGE_DENIED_TEXT: &str =
    "You must be root for this operation on system units. Press space to toggle: System/User.";

/// Confirm variant, used when an elevation helper is available
pub const ELEVATION_PROMPT_TEXT: &str =
    "You must be root for this operation on system units.\nRestart servicemaster with elevated privileges? (y/n)";

pub const NO_SELECTION_TEXT: &str = "No valid service selected.";

pub const OPERATION_FAILED_TEXT: &str = "Command could not be executed on this unit.";

/// Privilege level of the running process
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Privilege {
    Elevated,
    Unprivileged,
}

impl Privilege {
    pub fn from_effective_uid(euid: u32) -> Self {
        if euid == 0 {
            Privilege::Elevated
        } else {
            Privilege::Unprivileged
        }
    }

    pub fn is_elevated(&self) -> bool {
        matches!(self, Privilege::Elevated)
    }

    /// Scope shown at startup: system when elevated, user otherwise
    pub fn default_scope(&self) -> Scope {
        match self {
            Privilege::Elevated => Scope::System,
            Privilege::Unprivileged => Scope::User,
        }
    }
}

/// Whether a mutating operation in `scope` may go ahead.
/// User-scope operations are never blocked.
pub fn permits(scope: Scope, privilege: Privilege) -> bool {
    scope == Scope::User || privilege.is_elevated()
}

/// Typed result of one operation request
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OpOutcome {
    Ok { name: String },
    PrivilegeDenied,
    NoSelection,
    Failed { op: UnitOp, error: DirectoryError },
}

/// Gate, validate and forward `op` on the selected unit.
///
/// Unit-file operations (enable/disable/mask/unmask) also re-query the
/// unit's enable state on success.
pub fn perform(
    dir: &mut dyn UnitDirectory,
    selected: Option<&str>,
    op: UnitOp,
    privilege: Privilege,
) -> OpOutcome {
    let scope = dir.scope();
    if !permits(scope, privilege) {
        warn!(op = op.verb(), scope = scope.as_arg(), "operation refused: not elevated");
        return OpOutcome::PrivilegeDenied;
    }
    let Some(name) = selected else {
        return OpOutcome::NoSelection;
    };

    info!(op = op.verb(), unit = name, "requesting operation");
    if let Err(error) = dir.operation(name, op) {
        warn!(op = op.verb(), unit = name, %error, "operation failed");
        return OpOutcome::Failed { op, error };
    }
    if op.changes_unit_file() {
        if let Err(error) = dir.refresh_enable_state(name) {
            warn!(unit = name, %error, "could not refresh unit file state");
        }
    }
    OpOutcome::Ok {
        name: name.to_string(),
    }
}

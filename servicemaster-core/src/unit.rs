//! Unit model for servicemaster
//!
//! A unit is anything systemd manages: services, sockets, timers, mounts, etc.
//! Records are owned by the unit directory; the dashboard only reads them.

use std::fmt;

/// Unique identifier for a unit (its full name, e.g. `sshd.service`)
pub type UnitName = String;

/// The type tag of a unit, derived from its name suffix
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UnitCategory {
    Device,
    Slice,
    Service,
    Socket,
    Target,
    Timer,
    Mount,
    Scope,
    Automount,
    Swap,
    Path,
    Snapshot,
}

impl UnitCategory {
    /// All categories in legend order
    pub const ALL: [UnitCategory; 12] = [
        UnitCategory::Device,
        UnitCategory::Slice,
        UnitCategory::Service,
        UnitCategory::Socket,
        UnitCategory::Target,
        UnitCategory::Timer,
        UnitCategory::Mount,
        UnitCategory::Scope,
        UnitCategory::Automount,
        UnitCategory::Swap,
        UnitCategory::Path,
        UnitCategory::Snapshot,
    ];

    /// Suffix used in unit names (without the dot)
    pub fn suffix(&self) -> &'static str {
        match self {
            UnitCategory::Device => "device",
            UnitCategory::Slice => "slice",
            UnitCategory::Service => "service",
            UnitCategory::Socket => "socket",
            UnitCategory::Target => "target",
            UnitCategory::Timer => "timer",
            UnitCategory::Mount => "mount",
            UnitCategory::Scope => "scope",
            UnitCategory::Automount => "automount",
            UnitCategory::Swap => "swap",
            UnitCategory::Path => "path",
            UnitCategory::Snapshot => "snapshot",
        }
    }

    /// Determine the category from a unit name such as `cups.socket`
    pub fn from_unit_name(name: &str) -> Option<Self> {
        let (_, suffix) = name.rsplit_once('.')?;
        Self::ALL.into_iter().find(|c| c.suffix() == suffix)
    }

    /// Filter key bound to this category
    pub fn key(&self) -> char {
        match self {
            UnitCategory::Device => 'd',
            UnitCategory::Slice => 'i',
            UnitCategory::Service => 's',
            UnitCategory::Socket => 'o',
            UnitCategory::Target => 't',
            UnitCategory::Timer => 'r',
            UnitCategory::Mount => 'm',
            UnitCategory::Scope => 'c',
            UnitCategory::Automount => 'n',
            UnitCategory::Swap => 'w',
            UnitCategory::Path => 'p',
            UnitCategory::Snapshot => 'h',
        }
    }
}

impl fmt::Display for UnitCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Active category filter: one category or everything
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnitFilter {
    All,
    Only(UnitCategory),
}

impl Default for UnitFilter {
    fn default() -> Self {
        UnitFilter::Only(UnitCategory::Service)
    }
}

impl UnitFilter {
    /// Legend order: "all" first, then every category
    fn ordinal(&self) -> usize {
        match self {
            UnitFilter::All => 0,
            UnitFilter::Only(c) => {
                1 + UnitCategory::ALL
                    .iter()
                    .position(|x| x == c)
                    .unwrap_or_default()
            }
        }
    }

    fn from_ordinal(n: usize) -> Self {
        match n {
            0 => UnitFilter::All,
            n => UnitFilter::Only(UnitCategory::ALL[(n - 1).min(UnitCategory::ALL.len() - 1)]),
        }
    }

    /// Next filter in legend order, stopping at the last one
    pub fn next(&self) -> Self {
        Self::from_ordinal(self.ordinal() + 1)
    }

    /// Previous filter in legend order, stopping at "all"
    pub fn prev(&self) -> Self {
        Self::from_ordinal(self.ordinal().saturating_sub(1))
    }

    pub fn matches(&self, category: UnitCategory) -> bool {
        match self {
            UnitFilter::All => true,
            UnitFilter::Only(c) => *c == category,
        }
    }

    /// Resolve a filter key (`a` for all, or a category key)
    pub fn from_key(key: char) -> Option<Self> {
        if key == 'a' {
            return Some(UnitFilter::All);
        }
        UnitCategory::ALL
            .into_iter()
            .find(|c| c.key() == key)
            .map(UnitFilter::Only)
    }

    /// Capitalized label used in the header count (`Service: 42`)
    pub fn label(&self) -> String {
        let raw = match self {
            UnitFilter::All => "all",
            UnitFilter::Only(c) => c.suffix(),
        };
        let mut chars = raw.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

/// Which service manager the dashboard is looking at
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Scope {
    #[default]
    System,
    User,
}

impl Scope {
    pub fn toggled(self) -> Self {
        match self {
            Scope::System => Scope::User,
            Scope::User => Scope::System,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Scope::System => "SYSTEM",
            Scope::User => "USER",
        }
    }

    /// Lowercase form used on the command line
    pub fn as_arg(&self) -> &'static str {
        match self {
            Scope::System => "system",
            Scope::User => "user",
        }
    }
}

/// Mutating operations the dashboard can request on a unit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnitOp {
    Start,
    Stop,
    Restart,
    Enable,
    Disable,
    Mask,
    Unmask,
    Reload,
}

impl UnitOp {
    /// Function-key order: F1 starts, F8 reloads
    pub const FUNCTION_KEYS: [UnitOp; 8] = [
        UnitOp::Start,
        UnitOp::Stop,
        UnitOp::Restart,
        UnitOp::Enable,
        UnitOp::Disable,
        UnitOp::Mask,
        UnitOp::Unmask,
        UnitOp::Reload,
    ];

    /// Operation bound to function key `n` (1-based)
    pub fn from_function_key(n: u8) -> Option<Self> {
        let idx = usize::from(n).checked_sub(1)?;
        Self::FUNCTION_KEYS.get(idx).copied()
    }

    /// The systemctl verb
    pub fn verb(&self) -> &'static str {
        match self {
            UnitOp::Start => "start",
            UnitOp::Stop => "stop",
            UnitOp::Restart => "restart",
            UnitOp::Enable => "enable",
            UnitOp::Disable => "disable",
            UnitOp::Mask => "mask",
            UnitOp::Unmask => "unmask",
            UnitOp::Reload => "reload",
        }
    }

    /// Title-case label used in modal titles
    pub fn label(&self) -> &'static str {
        match self {
            UnitOp::Start => "Start",
            UnitOp::Stop => "Stop",
            UnitOp::Restart => "Restart",
            UnitOp::Enable => "Enable",
            UnitOp::Disable => "Disable",
            UnitOp::Mask => "Mask",
            UnitOp::Unmask => "Unmask",
            UnitOp::Reload => "Reload",
        }
    }

    /// Whether the operation changes the unit file state (enable/disable/mask)
    pub fn changes_unit_file(&self) -> bool {
        matches!(
            self,
            UnitOp::Enable | UnitOp::Disable | UnitOp::Mask | UnitOp::Unmask
        )
    }
}

/// A unit as reported by the unit directory
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitRecord {
    pub name: UnitName,
    pub category: UnitCategory,
    /// Load state (`loaded`, `not-found`, `masked`, ...)
    pub load: String,
    /// Unit file state (`enabled`, `static`, ...), absent for transient units
    pub enable_state: Option<String>,
    /// Activation state (`active`, `inactive`, `failed`, ...)
    pub active: String,
    /// Low-level sub state (`running`, `exited`, `dead`, ...)
    pub sub: String,
    pub description: String,
}

impl UnitRecord {
    /// Build a record, deriving the category from the name.
    ///
    /// Returns `None` for names without a known unit suffix.
    pub fn new(
        name: impl Into<String>,
        load: impl Into<String>,
        enable_state: Option<String>,
        active: impl Into<String>,
        sub: impl Into<String>,
        description: impl Into<String>,
    ) -> Option<Self> {
        let name = name.into();
        let category = UnitCategory::from_unit_name(&name)?;
        Some(Self {
            name,
            category,
            load: load.into(),
            enable_state,
            active: active.into(),
            sub: sub.into(),
            description: description.into(),
        })
    }

    /// Value shown in the STATE column: unit file state, else load state
    pub fn display_state(&self) -> &str {
        match self.enable_state.as_deref() {
            Some(s) if !s.is_empty() => s,
            _ => &self.load,
        }
    }
}

mod elevate;
mod input;
mod logging;
mod systemctl;
mod terminal;

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use crossterm::event::EventStream;
use futures_util::StreamExt;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{info, warn};

use servicemaster_core::config::{self, BUILTIN_CONFIG, SchemeStore};
use servicemaster_core::directory::{DirectoryError, MemoryDirectory, UnitDirectory};
use servicemaster_core::escape::MonotonicClock;
use servicemaster_core::privilege::Privilege;
use servicemaster_core::render::HEADLINE;
use servicemaster_core::sort::SortOrder;
use servicemaster_core::theme::ThemeManager;
use servicemaster_core::unit::{Scope, UnitRecord};
use servicemaster_core::{Dashboard, DashboardError, DashboardOptions, Flow, Input};

use systemctl::{Refresh, SystemctlDirectory, fetch_listing};
use terminal::{TerminalCanvas, install_panic_hook, restore_terminal, setup_terminal};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How often the unit list is fetched again
const REFRESH_INTERVAL: Duration = Duration::from_secs(2);

const CONTROLS: &str = "\
After launching servicemaster:
  Up/Down, j/k, PgUp/PgDn   move through the unit list
  Left/Right, a-z           choose the unit category
  Space                     toggle between system and user units
  Enter                     show the status of the selected unit
  F1-F8                     start, stop, restart, enable, disable, mask, unmask, reload
  Tab                       pick a column to sort by
  f                         search units by name
  +/-                       switch color scheme
  q, ESC                    quit";

#[derive(Parser)]
#[command(name = "servicemaster")]
#[command(about = "Browse and control systemd units", long_about = None)]
#[command(disable_version_flag = true, after_help = CONTROLS)]
struct Cli {
    /// Print version information and exit
    #[arg(short = 'v', long)]
    version: bool,
    /// Do not show the welcome message
    #[arg(short = 'w', long)]
    no_welcome: bool,
    /// Start with this color scheme
    #[arg(short = 'c', long, value_name = "NAME")]
    colorscheme: Option<String>,
    /// List the available color schemes and exit
    #[arg(short = 'l', long)]
    list: bool,
    /// Print the configuration file and exit
    #[arg(short = 'p', long)]
    print_config: bool,
    /// Open the configuration file in $EDITOR
    #[arg(short = 'e', long)]
    edit_config: bool,
    /// Configuration file to read
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Unit manager to show first
    #[arg(long, value_enum)]
    scope: Option<ScopeArg>,
    /// Use a built-in list of example units instead of systemctl
    #[arg(long)]
    demo: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ScopeArg {
    System,
    User,
}

impl From<ScopeArg> for Scope {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::System => Scope::System,
            ScopeArg::User => Scope::User,
        }
    }
}

/// Outcome of a background listing task
type Listing = Result<Result<Vec<UnitRecord>, DirectoryError>, JoinError>;

/// Where the unit list comes from
enum Backend {
    Demo(MemoryDirectory),
    Systemctl(SystemctlDirectory),
}

impl Backend {
    fn directory(&self) -> &dyn UnitDirectory {
        match self {
            Backend::Demo(dir) => dir,
            Backend::Systemctl(dir) => dir,
        }
    }

    fn directory_mut(&mut self) -> &mut dyn UnitDirectory {
        match self {
            Backend::Demo(dir) => dir,
            Backend::Systemctl(dir) => dir,
        }
    }

    /// Scope to list on the next refresh; the demo list never changes
    fn listing_scope(&self) -> Option<Scope> {
        match self {
            Backend::Demo(_) => None,
            Backend::Systemctl(dir) => Some(dir.scope()),
        }
    }

    fn accept_listing(&mut self, scope: Scope, listing: Listing) -> Refresh {
        let records = match listing {
            Ok(Ok(records)) => records,
            Ok(Err(err)) => {
                warn!(%err, "unit refresh failed");
                return Refresh::Unchanged;
            }
            Err(err) => {
                warn!(%err, "unit refresh task failed");
                return Refresh::Unchanged;
            }
        };
        match self {
            Backend::Demo(_) => Refresh::Unchanged,
            Backend::Systemctl(dir) => dir.replace(scope, records),
        }
    }
}

fn effective_uid() -> u32 {
    // SAFETY: geteuid has no preconditions and always succeeds
    unsafe { libc::geteuid() }
}

fn welcome_text(config_path: &Path) -> String {
    format!(
        "Welcome to ServiceMaster!\n\n\
         This tool lets you manage systemd units from a terminal.\n\n\
         SECURITY GUIDELINE:\n\
         - Only root can manage system services.\n\
         - Regular users can only manage their own user services.\n\n\
         Color schemes and settings are read from:\n{}\n\
         'servicemaster --help' for more information.\n\n\
         Press any key to continue...",
        config_path.display()
    )
}

fn load_store(path: &Path) -> anyhow::Result<SchemeStore> {
    if !path.exists() {
        warn!(path = %path.display(), "configuration file not found, using built-in color schemes");
        return Ok(SchemeStore::builtin());
    }
    let schemes = config::load(path)
        .with_context(|| format!("cannot load color schemes from {}", path.display()))?;
    Ok(SchemeStore::new(schemes)?)
}

/// A name given on the command line wins over the configured one
fn select_scheme(store: &mut SchemeStore, requested: Option<&str>, path: &Path) {
    let name = match requested {
        Some(name) => Some(name.to_string()),
        None if path.exists() => config::load_active_name(path)
            .map_err(|err| warn!(%err, "no active color scheme configured"))
            .ok(),
        None => config::active_name_from_str(BUILTIN_CONFIG).ok(),
    };
    let Some(name) = name else {
        return;
    };
    match store.position(&name) {
        Some(index) => {
            store.set_active(index);
        }
        None => warn!(scheme = %name, "unknown color scheme, using the first one"),
    }
}

fn list_schemes(store: &SchemeStore) {
    println!("\nServiceMaster {VERSION}\n");
    println!("Available colorschemes:");
    println!("-----------------------\n");
    for scheme in store.schemes() {
        println!("{}", scheme.name);
    }
    println!();
}

fn print_config(path: &Path) -> anyhow::Result<()> {
    println!("\nServiceMaster {VERSION}\n");
    println!("Configuration file: {}\n", path.display());
    match std::fs::read_to_string(path) {
        Ok(content) => print!("{content}"),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            println!("(not found, showing the built-in configuration)");
            print!("{BUILTIN_CONFIG}");
        }
        Err(err) => return Err(err).with_context(|| format!("cannot read {}", path.display())),
    }
    Ok(())
}

fn edit_config(path: &Path, privilege: Privilege) -> anyhow::Result<()> {
    let editor = std::env::var("EDITOR")
        .ok()
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| "vi".to_string());
    let mut words = editor.split_whitespace();
    let program = words.next().unwrap_or("vi");

    let mut cmd = if privilege.is_elevated() {
        Command::new(program)
    } else {
        let mut sudo = Command::new("sudo");
        sudo.arg(program);
        sudo
    };
    println!("\nConfiguration file: {}\n", path.display());
    let status = cmd
        .args(words)
        .arg(path)
        .status()
        .with_context(|| format!("cannot start {program}"))?;
    if !status.success() {
        bail!("failed to edit configuration file ({status})");
    }
    Ok(())
}

/// Apply a refreshed listing: point-redraw changed rows when their
/// positions are stable, otherwise repaint everything
fn apply_refresh(
    dash: &mut Dashboard,
    canvas: &mut TerminalCanvas,
    backend: &Backend,
    refresh: Refresh,
) -> Result<(), DashboardError> {
    match refresh {
        Refresh::Unchanged => Ok(()),
        Refresh::Changed(names) if dash.state().sort == SortOrder::None => {
            for name in &names {
                dash.mark_changed(name);
            }
            dash.redraw_dirty(canvas, backend.directory())?;
            Ok(())
        }
        Refresh::Changed(_) | Refresh::Restructured => dash.redraw(canvas, backend.directory()),
    }
}

async fn event_loop(
    dash: &mut Dashboard,
    canvas: &mut TerminalCanvas,
    backend: &mut Backend,
) -> anyhow::Result<Flow> {
    let mut events = EventStream::new();
    let mut refresh = interval(REFRESH_INTERVAL);
    refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);
    refresh.tick().await;
    let mut listing: Option<(Scope, JoinHandle<Result<Vec<UnitRecord>, DirectoryError>>)> = None;

    loop {
        let escape_wait = dash.escape_wait();
        let input = tokio::select! {
            maybe_event = events.next() => match maybe_event {
                Some(Ok(event)) => match input::translate(event) {
                    Some(input) => input,
                    None => continue,
                },
                Some(Err(err)) => return Err(err).context("terminal input failed"),
                None => return Ok(Flow::Exit),
            },
            _ = refresh.tick(), if listing.is_none() => {
                listing = backend
                    .listing_scope()
                    .map(|scope| (scope, tokio::spawn(fetch_listing(scope))));
                continue;
            }
            Some((scope, joined)) = async {
                match listing.as_mut() {
                    Some((scope, task)) => Some((*scope, task.await)),
                    None => None,
                }
            }, if listing.is_some() => {
                listing = None;
                let change = backend.accept_listing(scope, joined);
                apply_refresh(dash, canvas, backend, change)?;
                continue;
            }
            _ = sleep(escape_wait.unwrap_or_default()), if escape_wait.is_some() => {
                Input::Tick
            }
        };

        if let Input::Resize(w, h) = input {
            canvas.resize(w, h);
        }
        let flow = dash.handle_input(input, canvas, backend.directory_mut())?;
        if flow != Flow::Continue {
            return Ok(flow);
        }
    }
}

async fn run_dashboard(
    dash: &mut Dashboard,
    canvas: &mut TerminalCanvas,
    backend: &mut Backend,
) -> anyhow::Result<Flow> {
    dash.init(canvas, backend.directory_mut())?;
    dash.redraw(canvas, backend.directory())?;
    event_loop(dash, canvas, backend).await
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = config::resolve_path(cli.config.as_deref());
    let privilege = Privilege::from_effective_uid(effective_uid());

    if cli.print_config {
        return print_config(&config_path);
    }
    if cli.edit_config {
        return edit_config(&config_path, privilege);
    }

    let log_path = logging::init();
    let mut store = load_store(&config_path)?;
    if cli.list {
        list_schemes(&store);
        return Ok(());
    }
    select_scheme(&mut store, cli.colorscheme.as_deref(), &config_path);

    let scope = cli
        .scope
        .map(Scope::from)
        .unwrap_or_else(|| privilege.default_scope());
    let helper = if privilege.is_elevated() {
        None
    } else {
        elevate::find_helper()
    };
    info!(?privilege, scope = scope.as_arg(), helper = ?helper, log = ?log_path, "starting");

    let mut backend = if cli.demo {
        Backend::Demo(MemoryDirectory::demo())
    } else {
        Backend::Systemctl(
            SystemctlDirectory::new(scope, effective_uid())
                .context("cannot list systemd units")?,
        )
    };

    let options = DashboardOptions {
        privilege,
        scope,
        elevation_available: helper.is_some(),
    };
    let mut dash = Dashboard::new(
        ThemeManager::new(store),
        options,
        Box::new(MonotonicClock::new()),
    );
    if !cli.no_welcome {
        dash.show_status(HEADLINE, welcome_text(&config_path));
    }

    let (width, height) = crossterm::terminal::size().context("cannot query the terminal size")?;
    let terminal = setup_terminal().context("cannot set up the terminal")?;
    install_panic_hook();
    let mut canvas = TerminalCanvas::new(terminal, width, height);

    let outcome = run_dashboard(&mut dash, &mut canvas, &mut backend).await;
    let cleared = dash.teardown(&mut canvas);
    restore_terminal(canvas.into_terminal()).context("cannot restore the terminal")?;
    let flow = outcome?;
    cleared?;

    match (flow, helper) {
        (Flow::Elevate(request), Some(helper)) => Err(elevate::exec(&helper, &request, cli.demo)),
        _ => {
            info!("bye");
            Ok(())
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    if cli.version {
        println!("Version: {VERSION}");
        return;
    }
    if let Err(e) = run(cli).await {
        tracing::error!(error = %e, "fatal");
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

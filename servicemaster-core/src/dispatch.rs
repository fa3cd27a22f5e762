//! Input dispatcher
//!
//! [`Dashboard`] owns the view state and turns one input event at a time into
//! state changes, unit operations and redraws. Nothing in here blocks: escape
//! capture is driven by the caller through [`Input::Tick`] once
//! [`Dashboard::escape_wait`] has elapsed.

use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::canvas::{Canvas, CanvasError};
use crate::directory::{DirectoryError, UnitDirectory, units};
use crate::escape::{Clock, ESCAPE_GRACE, EscapeDecoder, EscapeStep};
use crate::layout::ScreenLayout;
use crate::list_view::ListView;
use crate::modal::{ConfirmAction, Modal, draw_search_box};
use crate::privilege::{
    ELEVATION_PROMPT_TEXT, NO_SELECTION_TEXT, OPERATION_FAILED_TEXT, OpOutcome,
    PRIVILEGE_DENIED_TEXT, Privilege, perform,
};
use crate::render::{HeaderInfo, draw_header, draw_row};
use crate::search::{SearchInput, find_first};
use crate::sort::{Projection, SortColumn, SortOrder};
use crate::theme::{Cycle, ThemeManager};
use crate::unit::{Scope, UnitFilter, UnitName, UnitOp};

const SYSTEM_ONLY_TEXT: &str =
    "No user service manager is reachable. Only system units can be shown.";

const NO_STATUS_TEXT: &str = "No status information available.";

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("your terminal does not support changing colors")]
    UnsupportedTerminal,
    #[error(transparent)]
    Canvas(CanvasError),
}

impl From<CanvasError> for DashboardError {
    fn from(err: CanvasError) -> Self {
        match err {
            CanvasError::ColorsUnsupported => DashboardError::UnsupportedTerminal,
            other => DashboardError::Canvas(other),
        }
    }
}

/// Keys the dashboard understands, independent of any terminal library
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Esc,
    Tab,
    BackTab,
    Backspace,
    Up,
    Down,
    Left,
    Right,
    PageUp,
    PageDown,
    /// Function key, 1-based
    F(u8),
    CtrlC,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Input {
    Key(Key),
    /// The canvas now has this size
    Resize(u16, u16),
    /// The escape-capture wait may have run out
    Tick,
}

/// Restart request produced by a confirmed elevation prompt
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElevationRequest {
    pub theme: String,
    pub scope: Scope,
}

/// What the caller should do after an input event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
    Elevate(ElevationRequest),
}

/// Dispatcher sub-state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InputMode {
    #[default]
    Normal,
    EscapeCapture,
    SearchModal,
    HeaderHighlight(SortColumn),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Repaint {
    None,
    Rows,
    Full,
}

/// Startup settings injected by the caller
#[derive(Clone, Copy, Debug)]
pub struct DashboardOptions {
    pub privilege: Privilege,
    pub scope: Scope,
    /// An elevation helper exists, so privilege errors offer a restart
    pub elevation_available: bool,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self {
            privilege: Privilege::Elevated,
            scope: Scope::System,
            elevation_available: false,
        }
    }
}

/// Everything the dashboard remembers between input events
#[derive(Clone, Debug, Default)]
pub struct ViewState {
    pub filter: UnitFilter,
    pub scope: Scope,
    pub list: ListView,
    pub sort: SortOrder,
    pub mode: InputMode,
    pub modal: Option<Modal>,
    pub search: SearchInput,
}

/// Screen row of a drawn unit, and whether it needs repainting
#[derive(Clone, Copy, Debug, Default)]
struct RowAnnotation {
    row: Option<u16>,
    dirty: bool,
}

pub struct Dashboard {
    state: ViewState,
    themes: ThemeManager,
    layout: ScreenLayout,
    annotations: HashMap<UnitName, RowAnnotation>,
    escape: EscapeDecoder,
    clock: Box<dyn Clock>,
    started: Duration,
    options: DashboardOptions,
}

impl Dashboard {
    pub fn new(themes: ThemeManager, options: DashboardOptions, clock: Box<dyn Clock>) -> Self {
        let started = clock.now();
        Self {
            state: ViewState {
                scope: options.scope,
                ..ViewState::default()
            },
            themes,
            layout: ScreenLayout::new(0, 0),
            annotations: HashMap::new(),
            escape: EscapeDecoder::default(),
            clock,
            started,
            options,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn themes(&self) -> &ThemeManager {
        &self.themes
    }

    pub fn layout(&self) -> &ScreenLayout {
        &self.layout
    }

    pub fn current_scope(&self) -> Scope {
        self.state.scope
    }

    pub fn current_filter(&self) -> UnitFilter {
        self.state.filter
    }

    /// Program the colors, size the layout and select the starting scope.
    ///
    /// Fails when the terminal cannot redefine colors.
    pub fn init(
        &mut self,
        canvas: &mut dyn Canvas,
        dir: &mut dyn UnitDirectory,
    ) -> Result<(), DashboardError> {
        self.themes.apply(canvas)?;
        let (w, h) = canvas.size();
        self.layout = ScreenLayout::new(w, h);
        if let Err(err) = self.set_scope(self.state.scope, dir) {
            warn!(%err, "falling back to system scope");
            self.state.scope = Scope::System;
            if let Err(err) = dir.switch_scope(Scope::System) {
                warn!(%err, "system scope unavailable");
            }
        }
        canvas.erase();
        info!(width = w, height = h, scope = self.state.scope.as_arg(), "dashboard initialized");
        Ok(())
    }

    /// Leave the canvas blank
    pub fn teardown(&mut self, canvas: &mut dyn Canvas) -> Result<(), DashboardError> {
        self.escape.cancel();
        self.annotations.clear();
        canvas.erase();
        canvas.flush()?;
        debug!("dashboard torn down");
        Ok(())
    }

    /// Point the directory at `scope`; the list starts over from the top
    pub fn set_scope(
        &mut self,
        scope: Scope,
        dir: &mut dyn UnitDirectory,
    ) -> Result<(), DirectoryError> {
        dir.switch_scope(scope)?;
        self.state.scope = scope;
        self.state.list.reset();
        self.annotations.clear();
        info!(scope = scope.as_arg(), "scope switched");
        Ok(())
    }

    /// Open a status modal; it stays up until the next key
    pub fn show_status(&mut self, title: impl Into<String>, text: impl Into<String>) {
        self.state.modal = Some(Modal::status(title, text));
    }

    /// Flag a unit whose state changed so the next `redraw_dirty` repaints it
    pub fn mark_changed(&mut self, name: &str) {
        self.annotations.entry(name.to_string()).or_default().dirty = true;
    }

    /// Time left before an escape capture gives up, if one is running
    pub fn escape_wait(&self) -> Option<Duration> {
        let deadline = self.escape.deadline()?;
        Some(deadline.saturating_sub(self.clock.now()))
    }

    /// Recompute everything that depends on the terminal size
    pub fn resize(&mut self, width: u16, height: u16) {
        self.layout = ScreenLayout::new(width, height);
        debug!(width, height, narrow = self.layout.narrow, "resized");
    }

    /// Name of the selected unit in the filtered list
    pub fn selected_unit(&self, dir: &dyn UnitDirectory) -> Option<String> {
        let proj = Projection::build(dir, self.state.filter, self.state.sort);
        self.selected_in(&proj, dir)
    }

    fn selected_in(&self, proj: &Projection, dir: &dyn UnitDirectory) -> Option<String> {
        let idx = proj.directory_index(self.state.list.absolute())?;
        dir.nth(idx).map(|u| u.name.clone())
    }

    /// Erase and repaint everything: rows, header, then any overlay
    pub fn redraw(
        &mut self,
        canvas: &mut dyn Canvas,
        dir: &dyn UnitDirectory,
    ) -> Result<(), DashboardError> {
        let proj = Projection::build(dir, self.state.filter, self.state.sort);
        let page = self.layout.page_height;
        self.state.list.clamp(proj.len(), page);

        for ann in self.annotations.values_mut() {
            ann.row = None;
        }
        canvas.erase();

        if proj.is_empty() {
            debug!(filter = ?self.state.filter, "no units in view");
        }
        let palette = self.themes.palette();
        let visible = self.state.list.visible_range(proj.len(), page);
        for (offset, n) in visible.enumerate() {
            let Some(unit) = proj.directory_index(n).and_then(|idx| dir.nth(idx)) else {
                continue;
            };
            let Ok(y) = u16::try_from(offset).map(|o| self.layout.body_top + o) else {
                break;
            };
            let style = if offset == self.state.list.selection {
                palette.selection_style()
            } else {
                palette.text_style()
            };
            draw_row(canvas, &self.layout, unit, y, style);
            let ann = self.annotations.entry(unit.name.clone()).or_default();
            ann.row = Some(y);
            ann.dirty = false;
        }
        self.annotations.retain(|_, a| a.row.is_some() || a.dirty);

        let info = HeaderInfo {
            scope: self.state.scope,
            filter: self.state.filter,
            count: proj.len(),
            position: self.state.list.absolute(),
            theme_name: self.themes.active_name(),
            highlighted: match self.state.mode {
                InputMode::HeaderHighlight(column) => Some(column),
                _ => None,
            },
            sort: self.state.sort,
        };
        draw_header(canvas, &self.layout, palette, &info);

        if self.state.mode == InputMode::SearchModal {
            draw_search_box(canvas, palette, &self.state.search);
        } else if let Some(modal) = &self.state.modal {
            modal.draw(canvas, palette);
        }
        canvas.flush()?;
        Ok(())
    }

    /// Repaint only the rows flagged by `mark_changed`. Returns how many rows
    /// were drawn; nothing is drawn while an overlay covers the list.
    pub fn redraw_dirty(
        &mut self,
        canvas: &mut dyn Canvas,
        dir: &dyn UnitDirectory,
    ) -> Result<usize, DashboardError> {
        if self.state.modal.is_some() || self.state.mode == InputMode::SearchModal {
            return Ok(0);
        }
        let proj = Projection::build(dir, self.state.filter, self.state.sort);
        let selected = proj.directory_index(self.state.list.absolute());
        let palette = self.themes.palette();
        let mut drawn = 0;
        for (name, ann) in self.annotations.iter_mut().filter(|(_, a)| a.dirty) {
            ann.dirty = false;
            let Some(row) = ann.row else {
                continue;
            };
            let Some((idx, unit)) = units(dir).enumerate().find(|(_, u)| u.name == *name) else {
                continue;
            };
            let style = if Some(idx) == selected {
                palette.selection_style()
            } else {
                palette.text_style()
            };
            draw_row(canvas, &self.layout, unit, row, style);
            drawn += 1;
        }
        if drawn > 0 {
            canvas.flush()?;
        }
        Ok(drawn)
    }

    /// Dispatch one input event and repaint what it changed
    pub fn handle_input(
        &mut self,
        input: Input,
        canvas: &mut dyn Canvas,
        dir: &mut dyn UnitDirectory,
    ) -> Result<Flow, DashboardError> {
        let (flow, repaint) = match input {
            Input::Resize(w, h) => {
                self.resize(w, h);
                (Flow::Continue, Repaint::Full)
            }
            Input::Tick => self.on_tick(),
            Input::Key(key) => {
                debug!(?key, mode = ?self.state.mode, "key");
                self.on_key(key, canvas, dir)?
            }
        };
        if flow == Flow::Continue {
            match repaint {
                Repaint::Full => self.redraw(canvas, dir)?,
                Repaint::Rows => {
                    self.redraw_dirty(canvas, dir)?;
                }
                Repaint::None => {}
            }
        }
        Ok(flow)
    }

    fn grace_elapsed(&self, now: Duration) -> bool {
        now.saturating_sub(self.started) >= ESCAPE_GRACE
    }

    /// An ESC that did not turn into a known sequence quits, except right
    /// after startup
    fn stray_escape(&mut self, now: Duration) -> (Flow, Repaint) {
        if !self.escape.captured().is_empty() {
            debug!(captured = self.escape.captured(), "partial escape sequence dropped");
        }
        self.escape.cancel();
        self.state.mode = InputMode::Normal;
        if self.grace_elapsed(now) {
            info!("escape pressed, exiting");
            (Flow::Exit, Repaint::None)
        } else {
            debug!("ignoring escape during startup grace period");
            (Flow::Continue, Repaint::Full)
        }
    }

    fn on_tick(&mut self) -> (Flow, Repaint) {
        let now = self.clock.now();
        if self.state.mode == InputMode::EscapeCapture && self.escape.expired(now) {
            return self.stray_escape(now);
        }
        (Flow::Continue, Repaint::None)
    }

    fn on_key(
        &mut self,
        key: Key,
        canvas: &mut dyn Canvas,
        dir: &mut dyn UnitDirectory,
    ) -> Result<(Flow, Repaint), DashboardError> {
        if key == Key::CtrlC {
            return Ok((Flow::Exit, Repaint::None));
        }
        if let Some(modal) = self.state.modal.take() {
            return Ok(self.on_modal_key(modal, key));
        }
        let proj = Projection::build(dir, self.state.filter, self.state.sort);
        self.state.list.clamp(proj.len(), self.layout.page_height);

        match self.state.mode {
            InputMode::EscapeCapture => self.on_escape_key(key, canvas, dir),
            InputMode::SearchModal => Ok(self.on_search_key(key, dir)),
            InputMode::HeaderHighlight(column) => match key {
                Key::Tab | Key::Right => {
                    self.state.mode = InputMode::HeaderHighlight(column.next());
                    Ok((Flow::Continue, Repaint::Full))
                }
                Key::BackTab | Key::Left => {
                    self.state.mode = InputMode::HeaderHighlight(column.prev());
                    Ok((Flow::Continue, Repaint::Full))
                }
                Key::Enter => {
                    self.state.sort = self.state.sort.toggled(column);
                    self.state.mode = InputMode::Normal;
                    info!(sort = ?self.state.sort, "sort changed");
                    Ok((Flow::Continue, Repaint::Full))
                }
                Key::Esc => {
                    self.state.mode = InputMode::Normal;
                    Ok((Flow::Continue, Repaint::Full))
                }
                other => {
                    self.state.mode = InputMode::Normal;
                    self.on_normal_key(other, canvas, dir)
                }
            },
            InputMode::Normal => self.on_normal_key(key, canvas, dir),
        }
    }

    fn on_modal_key(&mut self, modal: Modal, key: Key) -> (Flow, Repaint) {
        let Modal::Confirm { action, .. } = &modal else {
            return (Flow::Continue, Repaint::Full);
        };
        let action = action.clone();
        match key {
            Key::Char('y' | 'Y') => match action {
                ConfirmAction::Elevate => {
                    let request = ElevationRequest {
                        theme: self.themes.active_name().to_string(),
                        scope: Scope::System,
                    };
                    info!(theme = %request.theme, "elevation requested");
                    (Flow::Elevate(request), Repaint::None)
                }
            },
            Key::Char('n' | 'N') | Key::Esc => (Flow::Continue, Repaint::Full),
            _ => {
                self.state.modal = Some(modal);
                (Flow::Continue, Repaint::None)
            }
        }
    }

    fn on_escape_key(
        &mut self,
        key: Key,
        canvas: &mut dyn Canvas,
        dir: &mut dyn UnitDirectory,
    ) -> Result<(Flow, Repaint), DashboardError> {
        let now = self.clock.now();
        if self.escape.expired(now) {
            let (flow, _) = self.stray_escape(now);
            if flow != Flow::Continue {
                return Ok((flow, Repaint::None));
            }
            return self.on_normal_key(key, canvas, dir);
        }
        let Key::Char(ch) = key else {
            return Ok(self.stray_escape(now));
        };
        match self.escape.feed(ch, now) {
            EscapeStep::Pending => Ok((Flow::Continue, Repaint::None)),
            EscapeStep::Resolved(op) => {
                self.state.mode = InputMode::Normal;
                debug!(op = op.verb(), "escape sequence");
                Ok((Flow::Continue, self.run_op(op, dir)))
            }
            EscapeStep::Unrecognized => Ok(self.stray_escape(now)),
        }
    }

    fn on_search_key(&mut self, key: Key, dir: &dyn UnitDirectory) -> (Flow, Repaint) {
        match key {
            Key::Char(ch) => {
                self.state.search.push(ch);
            }
            Key::Backspace => {
                self.state.search.backspace();
            }
            Key::Enter => self.submit_search(dir),
            Key::Esc => {
                self.state.search = SearchInput::new();
                self.state.mode = InputMode::Normal;
            }
            _ => return (Flow::Continue, Repaint::None),
        }
        (Flow::Continue, Repaint::Full)
    }

    fn submit_search(&mut self, dir: &dyn UnitDirectory) {
        let query = std::mem::take(&mut self.state.search).query().to_string();
        self.state.mode = InputMode::Normal;
        if query.is_empty() {
            return;
        }
        let all = Projection::build(dir, UnitFilter::All, self.state.sort);
        let found = find_first(dir, &all.order, &query)
            .and_then(|(_, idx)| dir.nth(idx).map(|u| (idx, u.category)));
        let Some((idx, category)) = found else {
            info!(query = %query, "search found nothing");
            self.show_status("Search:", format!("No unit matches '{query}'."));
            return;
        };
        self.state.filter = UnitFilter::Only(category);
        let proj = Projection::build(dir, self.state.filter, self.state.sort);
        let pos = proj.filtered.iter().position(|&i| i == idx).unwrap_or(0);
        self.state.list.reveal(pos, self.layout.page_height);
        info!(query = %query, %category, pos, "search match");
    }

    fn set_filter(&mut self, filter: UnitFilter) {
        self.state.filter = filter;
        self.state.list.reset();
        info!(filter = %filter.label(), "filter changed");
    }

    fn on_normal_key(
        &mut self,
        key: Key,
        canvas: &mut dyn Canvas,
        dir: &mut dyn UnitDirectory,
    ) -> Result<(Flow, Repaint), DashboardError> {
        let proj = Projection::build(dir, self.state.filter, self.state.sort);
        let (len, page) = (proj.len(), self.layout.page_height);
        let repaint = match key {
            Key::Up | Key::Char('k') => {
                self.state.list.move_selection(-1, len, page);
                Repaint::Full
            }
            Key::Down | Key::Char('j') => {
                self.state.list.move_selection(1, len, page);
                Repaint::Full
            }
            Key::PageUp => {
                self.state.list.page_up(page);
                Repaint::Full
            }
            Key::PageDown => {
                self.state.list.page_down(len, page);
                Repaint::Full
            }
            Key::Left => {
                self.set_filter(self.state.filter.prev());
                Repaint::Full
            }
            Key::Right => {
                self.set_filter(self.state.filter.next());
                Repaint::Full
            }
            Key::Char(' ') => {
                self.toggle_scope(dir);
                Repaint::Full
            }
            Key::F(n) => match UnitOp::from_function_key(n) {
                Some(op) => self.run_op(op, dir),
                None => Repaint::None,
            },
            Key::Enter => {
                if let Some(name) = self.selected_in(&proj, dir) {
                    let text = dir
                        .status_text(&name)
                        .unwrap_or_else(|| NO_STATUS_TEXT.to_string());
                    self.show_status("Status:", text);
                }
                Repaint::Full
            }
            Key::Tab => {
                self.state.mode = InputMode::HeaderHighlight(SortColumn::Name);
                Repaint::Full
            }
            Key::BackTab => {
                self.state.mode = InputMode::HeaderHighlight(SortColumn::Description);
                Repaint::Full
            }
            Key::Char('+') => self.cycle_theme(Cycle::Next, canvas)?,
            Key::Char('-') => self.cycle_theme(Cycle::Prev, canvas)?,
            Key::Char('f') => {
                self.state.search = SearchInput::new();
                self.state.mode = InputMode::SearchModal;
                Repaint::Full
            }
            Key::Char('q') | Key::Char('Q') => return Ok((Flow::Exit, Repaint::None)),
            Key::Esc => {
                self.escape.begin(self.clock.now());
                self.state.mode = InputMode::EscapeCapture;
                Repaint::None
            }
            Key::Char(ch) => match UnitFilter::from_key(ch) {
                Some(filter) => {
                    self.set_filter(filter);
                    Repaint::Full
                }
                None => Repaint::None,
            },
            Key::Backspace | Key::CtrlC => Repaint::None,
        };
        Ok((Flow::Continue, repaint))
    }

    fn toggle_scope(&mut self, dir: &mut dyn UnitDirectory) {
        if dir.scope_is_system_only() {
            self.show_status("info:", SYSTEM_ONLY_TEXT);
            return;
        }
        if let Err(err) = self.set_scope(self.state.scope.toggled(), dir) {
            warn!(%err, "scope switch failed");
            self.show_status("Error:", err.to_string());
        }
    }

    fn cycle_theme(
        &mut self,
        dir: Cycle,
        canvas: &mut dyn Canvas,
    ) -> Result<Repaint, DashboardError> {
        if self.themes.cycle(dir) {
            self.themes.apply(canvas)?;
        }
        Ok(Repaint::Full)
    }

    /// Forward `op` for the selected unit through the privilege gate
    fn run_op(&mut self, op: UnitOp, dir: &mut dyn UnitDirectory) -> Repaint {
        let selected = self.selected_unit(dir);
        match perform(dir, selected.as_deref(), op, self.options.privilege) {
            OpOutcome::Ok { name } => {
                if op.changes_unit_file() {
                    self.mark_changed(&name);
                    return Repaint::Rows;
                }
            }
            OpOutcome::PrivilegeDenied => {
                self.state.modal = Some(if self.options.elevation_available {
                    Modal::Confirm {
                        title: "info:".to_string(),
                        text: ELEVATION_PROMPT_TEXT.to_string(),
                        action: ConfirmAction::Elevate,
                    }
                } else {
                    Modal::status("info:", PRIVILEGE_DENIED_TEXT)
                });
            }
            OpOutcome::NoSelection => self.show_status("Error:", NO_SELECTION_TEXT),
            OpOutcome::Failed { op, .. } => {
                self.show_status(format!("{}:", op.label()), OPERATION_FAILED_TEXT)
            }
        }
        Repaint::Full
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::CellCanvas;
    use crate::config::{BaseColor, SchemeStore};
    use crate::directory::{MemoryDirectory, find_unit};
    use crate::escape::testing::ManualClock;
    use crate::unit::{UnitCategory, UnitRecord};

    struct Harness {
        dash: Dashboard,
        canvas: CellCanvas,
        dir: MemoryDirectory,
        clock: ManualClock,
    }

    impl Harness {
        fn new(dir: MemoryDirectory, options: DashboardOptions, size: (u16, u16)) -> Self {
            let clock = ManualClock::default();
            let mut canvas = CellCanvas::new(size.0, size.1);
            let mut dir = dir;
            let mut dash = Dashboard::new(
                ThemeManager::new(SchemeStore::builtin()),
                options,
                Box::new(clock.clone()),
            );
            dash.init(&mut canvas, &mut dir).unwrap();
            dash.redraw(&mut canvas, &dir).unwrap();
            Self {
                dash,
                canvas,
                dir,
                clock,
            }
        }

        fn demo() -> Self {
            Self::new(MemoryDirectory::demo(), DashboardOptions::default(), (200, 30))
        }

        fn unprivileged(elevation_available: bool) -> Self {
            let options = DashboardOptions {
                privilege: Privilege::Unprivileged,
                scope: Scope::System,
                elevation_available,
            };
            Self::new(MemoryDirectory::demo(), options, (200, 30))
        }

        fn key(&mut self, key: Key) -> Flow {
            self.dash
                .handle_input(Input::Key(key), &mut self.canvas, &mut self.dir)
                .unwrap()
        }

        fn type_text(&mut self, text: &str) {
            for ch in text.chars() {
                self.key(Key::Char(ch));
            }
        }

        fn tick(&mut self) -> Flow {
            self.dash
                .handle_input(Input::Tick, &mut self.canvas, &mut self.dir)
                .unwrap()
        }

        fn selected(&self) -> Option<String> {
            self.dash.selected_unit(&self.dir)
        }

        fn filtered_len(&self) -> usize {
            let state = self.dash.state();
            Projection::build(&self.dir, state.filter, state.sort).len()
        }
    }

    fn many_units() -> MemoryDirectory {
        let mut system: Vec<UnitRecord> = (0..40)
            .filter_map(|i| {
                UnitRecord::new(
                    format!("unit{i:02}.service"),
                    "loaded",
                    Some("enabled".into()),
                    "active",
                    "running",
                    format!("Unit number {i}"),
                )
            })
            .collect();
        system.extend((0..5).filter_map(|i| {
            UnitRecord::new(format!("sock{i}.socket"), "loaded", None, "active", "listening", "")
        }));
        MemoryDirectory::new(system, Vec::new())
    }

    #[test]
    fn test_list_invariants_under_keys_and_shrinking() {
        let mut h = Harness::new(many_units(), DashboardOptions::default(), (200, 12));
        let page = h.dash.layout().page_height;
        assert_eq!(page, 6);

        let keys = [
            Key::Down,
            Key::Down,
            Key::PageDown,
            Key::Up,
            Key::PageUp,
            Key::Char('j'),
            Key::Char('o'),
            Key::Char('a'),
            Key::Char('s'),
            Key::Char('k'),
        ];
        let mut seed: u64 = 0x9e37_79b9_7f4a_7c15;
        for step in 0..400 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            h.key(keys[(seed % keys.len() as u64) as usize]);

            if step % 97 == 96 {
                let keep = h.dir.units_mut().len().saturating_sub(9);
                h.dir.units_mut().truncate(keep);
                h.dash.redraw(&mut h.canvas, &h.dir).unwrap();
            }

            let len = h.filtered_len();
            let list = h.dash.state().list;
            if len == 0 {
                assert_eq!(list, ListView::default());
            } else {
                assert!(list.selection < page.min(len), "step {step}: {list:?}");
                assert!(list.absolute() < len, "step {step}: {list:?}");
            }
        }
    }

    #[test]
    fn test_search_switches_filter_to_match_category() {
        let mut h = Harness::demo();
        assert_eq!(h.dash.current_filter(), UnitFilter::Only(UnitCategory::Service));

        h.key(Key::Char('f'));
        assert_eq!(h.dash.state().mode, InputMode::SearchModal);
        h.type_text("LOGROT");
        assert!(h.canvas.contents().contains("LOGROT"));
        h.key(Key::Enter);

        assert_eq!(h.dash.state().mode, InputMode::Normal);
        assert_eq!(h.dash.current_filter(), UnitFilter::Only(UnitCategory::Timer));
        assert_eq!(h.selected().as_deref(), Some("logrotate.timer"));
        assert!(h.dash.state().modal.is_none());
    }

    #[test]
    fn test_find_key_inside_search_is_text() {
        let mut h = Harness::demo();
        h.key(Key::Down);
        h.key(Key::Char('f'));
        h.type_text("QQ");
        h.key(Key::Char('f'));

        let state = h.dash.state();
        assert_eq!(state.mode, InputMode::SearchModal);
        assert_eq!(state.search.query(), "QQf");
        assert_eq!(state.list.absolute(), 1);
        assert!(h.canvas.contents().contains("QQf"));

        h.key(Key::Backspace);
        assert_eq!(h.dash.state().search.query(), "QQ");
    }

    #[test]
    fn test_search_match_beyond_first_page_lands_on_last_row() {
        let mut h = Harness::new(many_units(), DashboardOptions::default(), (200, 12));
        h.key(Key::Char('o'));
        h.key(Key::Char('f'));
        h.type_text("unit30");
        h.key(Key::Enter);

        let list = h.dash.state().list;
        assert_eq!(list.selection, 5);
        assert_eq!(list.absolute(), 30);
        assert_eq!(h.selected().as_deref(), Some("unit30.service"));
    }

    #[test]
    fn test_search_without_match_keeps_view() {
        let mut h = Harness::demo();
        h.key(Key::Down);
        h.key(Key::Down);
        let before = h.dash.state().list;

        h.key(Key::Char('f'));
        h.type_text("zzz-nothing");
        h.key(Key::Enter);

        let state = h.dash.state();
        assert_eq!(state.filter, UnitFilter::Only(UnitCategory::Service));
        assert_eq!(state.list, before);
        let modal = state.modal.as_ref().unwrap();
        assert!(modal.text().contains("zzz-nothing"));
        assert!(h.canvas.contents().contains("No unit matches"));

        h.key(Key::Char('x'));
        assert!(h.dash.state().modal.is_none());
        assert_eq!(h.dash.state().list, before);
    }

    #[test]
    fn test_empty_search_and_escape_cancel() {
        let mut h = Harness::demo();
        h.key(Key::Char('f'));
        h.key(Key::Enter);
        assert_eq!(h.dash.state().mode, InputMode::Normal);
        assert!(h.dash.state().modal.is_none());

        h.key(Key::Char('f'));
        h.type_text("ssh");
        h.key(Key::Backspace);
        assert_eq!(h.dash.state().search.query(), "ss");
        h.key(Key::Esc);
        assert_eq!(h.dash.state().mode, InputMode::Normal);
        assert_eq!(h.dash.current_filter(), UnitFilter::Only(UnitCategory::Service));
    }

    #[test]
    fn test_theme_keys_clamp_and_program_colors() {
        let mut h = Harness::demo();
        h.key(Key::Char('-'));
        assert_eq!(h.dash.themes().active_index(), 0);

        for _ in 0..10 {
            h.key(Key::Char('+'));
        }
        let last = h.dash.themes().store().len() - 1;
        assert_eq!(h.dash.themes().active_index(), last);
        assert_eq!(h.dash.themes().active_name(), "Dracula");
        assert_eq!(h.canvas.register(BaseColor::White), [973, 973, 949]);
        assert!(h.canvas.row_text(1).contains("Theme (Dracula)"));
    }

    #[test]
    fn test_unprivileged_system_ops_never_reach_directory() {
        let mut h = Harness::unprivileged(false);
        for n in 1..=8 {
            h.key(Key::F(n));
            let modal = h.dash.state().modal.clone().unwrap();
            assert_eq!(modal.text(), PRIVILEGE_DENIED_TEXT);
            h.key(Key::Char('x'));
        }

        h.clock.set(Duration::from_secs(1));
        h.key(Key::Esc);
        h.type_text("[11~");
        assert!(h.dash.state().modal.is_some());
        assert!(h.dir.calls().is_empty());
    }

    #[test]
    fn test_user_scope_ops_allowed_when_unprivileged() {
        let options = DashboardOptions {
            privilege: Privilege::Unprivileged,
            scope: Scope::User,
            elevation_available: false,
        };
        let mut h = Harness::new(MemoryDirectory::demo(), options, (200, 30));
        assert_eq!(h.dir.scope(), Scope::User);
        h.key(Key::F(1));
        assert!(h.dash.state().modal.is_none());
        assert_eq!(h.dir.calls().len(), 1);
    }

    #[test]
    fn test_confirmed_elevation_returns_request() {
        let mut h = Harness::unprivileged(true);
        h.key(Key::F(2));
        assert!(matches!(h.dash.state().modal, Some(Modal::Confirm { .. })));

        assert_eq!(h.key(Key::Char('z')), Flow::Continue);
        assert!(h.dash.state().modal.is_some());

        let flow = h.key(Key::Char('y'));
        assert_eq!(
            flow,
            Flow::Elevate(ElevationRequest {
                theme: "Default".into(),
                scope: Scope::System,
            })
        );
        assert!(h.dir.calls().is_empty());
    }

    #[test]
    fn test_declined_elevation_closes_prompt() {
        let mut h = Harness::unprivileged(true);
        h.key(Key::F(1));
        assert_eq!(h.key(Key::Char('n')), Flow::Continue);
        assert!(h.dash.state().modal.is_none());
    }

    #[test]
    fn test_lone_escape_ignored_during_grace_period() {
        let mut h = Harness::demo();
        h.clock.set(Duration::from_millis(100));
        h.key(Key::Esc);
        assert_eq!(h.dash.state().mode, InputMode::EscapeCapture);
        assert_eq!(h.dash.escape_wait(), Some(Duration::from_millis(50)));

        h.clock.set(Duration::from_millis(160));
        assert_eq!(h.tick(), Flow::Continue);
        assert_eq!(h.dash.state().mode, InputMode::Normal);
        assert_eq!(h.dash.escape_wait(), None);

        h.clock.set(Duration::from_millis(500));
        h.key(Key::Esc);
        h.clock.set(Duration::from_millis(540));
        assert_eq!(h.tick(), Flow::Continue);
        h.clock.set(Duration::from_millis(560));
        assert_eq!(h.tick(), Flow::Exit);
    }

    #[test]
    fn test_escape_sequence_runs_legacy_operation() {
        let mut h = Harness::demo();
        h.clock.set(Duration::from_secs(1));
        h.key(Key::Esc);
        h.type_text("[13~");
        assert_eq!(h.dash.state().mode, InputMode::Normal);
        assert_eq!(
            h.dir.calls(),
            &[("sshd.service".to_string(), UnitOp::Restart)]
        );
    }

    #[test]
    fn test_unknown_escape_sequence_exits_after_grace() {
        let mut h = Harness::demo();
        h.clock.set(Duration::from_secs(1));
        h.key(Key::Esc);
        h.type_text("[99");
        assert_eq!(h.key(Key::Char('~')), Flow::Exit);
        assert!(h.dir.calls().is_empty());
    }

    #[test]
    fn test_header_highlight_sorts_and_flips() {
        let mut h = Harness::demo();
        h.key(Key::Tab);
        assert_eq!(
            h.dash.state().mode,
            InputMode::HeaderHighlight(SortColumn::Name)
        );
        h.key(Key::Enter);
        assert_eq!(h.dash.state().mode, InputMode::Normal);
        assert_eq!(h.selected().as_deref(), Some("NetworkManager.service"));
        assert!(h.canvas.contents().contains("UNIT:▲"));

        h.key(Key::Tab);
        h.key(Key::Enter);
        assert_eq!(h.selected().as_deref(), Some("systemd-timesyncd.service"));

        h.key(Key::Tab);
        h.key(Key::Right);
        h.key(Key::Tab);
        h.key(Key::BackTab);
        assert_eq!(
            h.dash.state().mode,
            InputMode::HeaderHighlight(SortColumn::State)
        );
        h.key(Key::Esc);
        assert_eq!(h.dash.state().mode, InputMode::Normal);
        assert_eq!(
            h.dash.state().sort,
            SortOrder::Column(SortColumn::Name, crate::sort::Direction::Descending)
        );
    }

    #[test]
    fn test_filter_keys_reset_position() {
        let mut h = Harness::demo();
        h.key(Key::Down);
        h.key(Key::Down);
        h.key(Key::Char('t'));
        assert_eq!(h.dash.current_filter(), UnitFilter::Only(UnitCategory::Target));
        assert_eq!(h.dash.state().list, ListView::default());

        h.key(Key::Right);
        assert_eq!(h.dash.current_filter(), UnitFilter::Only(UnitCategory::Timer));
        h.key(Key::Char('a'));
        h.key(Key::Left);
        assert_eq!(h.dash.current_filter(), UnitFilter::All);
        assert!(h.canvas.contents().contains("All: 20"));
    }

    #[test]
    fn test_scope_toggle() {
        let mut h = Harness::demo();
        h.key(Key::Char(' '));
        assert_eq!(h.dash.current_scope(), Scope::User);
        assert_eq!(h.dir.scope(), Scope::User);
        assert!(h.canvas.contents().contains("(USER)"));

        let mut locked = Harness::new(
            MemoryDirectory::demo().with_system_only(true),
            DashboardOptions::default(),
            (200, 30),
        );
        locked.key(Key::Char(' '));
        assert_eq!(locked.dash.current_scope(), Scope::System);
        assert_eq!(
            locked.dash.state().modal.as_ref().map(Modal::title),
            Some("info:")
        );
    }

    #[test]
    fn test_enter_shows_status_until_next_key() {
        let mut h = Harness::demo();
        h.key(Key::Enter);
        let modal = h.dash.state().modal.clone().unwrap();
        assert_eq!(modal.title(), "Status:");
        assert!(modal.text().contains("sshd.service"));
        assert!(h.canvas.contents().contains("Status:"));

        // the dismissing key is consumed
        h.key(Key::Down);
        assert!(h.dash.state().modal.is_none());
        assert_eq!(h.dash.state().list.selection, 0);
    }

    #[test]
    fn test_unit_file_op_repaints_only_its_row() {
        let mut h = Harness::demo();
        h.key(Key::Down);
        assert_eq!(h.selected().as_deref(), Some("cups.service"));
        h.canvas.write_at(2, 25, "MARK");
        let flushes = h.canvas.flush_count();

        h.key(Key::F(4));
        let state_start = h.dash.layout().columns.state_start;
        let row = h.dash.layout().body_top + 1;
        assert_eq!(h.canvas.text_at(state_start, row, 9), "enabled  ");
        assert_eq!(h.canvas.text_at(2, 25, 4), "MARK");
        assert_eq!(h.canvas.flush_count(), flushes + 1);
        assert_eq!(
            find_unit(&h.dir, "cups.service").unwrap().enable_state.as_deref(),
            Some("enabled")
        );
    }

    #[test]
    fn test_changed_units_point_redraw() {
        let mut h = Harness::demo();
        if let Some(unit) = h.dir.units_mut().iter_mut().find(|u| u.name == "sshd.service") {
            unit.active = "failed".into();
        }
        h.dash.mark_changed("sshd.service");
        h.dash.mark_changed("not-on-screen.service");
        let drawn = h.dash.redraw_dirty(&mut h.canvas, &h.dir).unwrap();
        assert_eq!(drawn, 1);
        let active_start = h.dash.layout().columns.active_start;
        let row = h.dash.layout().body_top;
        assert_eq!(h.canvas.text_at(active_start, row, 6), "failed");
    }

    #[test]
    fn test_operation_errors_become_modals() {
        let mut h = Harness::new(
            MemoryDirectory::demo().with_failing_unit("sshd.service"),
            DashboardOptions::default(),
            (200, 30),
        );
        h.key(Key::F(2));
        let modal = h.dash.state().modal.clone().unwrap();
        assert_eq!(modal.title(), "Stop:");
        assert_eq!(modal.text(), OPERATION_FAILED_TEXT);

        h.key(Key::Char('x'));
        h.key(Key::Char('h'));
        h.key(Key::F(1));
        let modal = h.dash.state().modal.clone().unwrap();
        assert_eq!(modal.text(), NO_SELECTION_TEXT);
    }

    #[test]
    fn test_resize_recomputes_layout() {
        let mut h = Harness::demo();
        h.canvas.resize(100, 20);
        h.dash
            .handle_input(Input::Resize(100, 20), &mut h.canvas, &mut h.dir)
            .unwrap();
        let layout = *h.dash.layout();
        assert_eq!(layout.width, 100);
        assert!(layout.narrow);
        assert!(layout.columns.description_start < 99);
        assert!(h.canvas.contents().contains("sshd.service"));
    }

    #[test]
    fn test_quit_keys() {
        let mut h = Harness::demo();
        assert_eq!(h.key(Key::Char('q')), Flow::Exit);
        assert_eq!(h.key(Key::CtrlC), Flow::Exit);
    }

    #[test]
    fn test_unsupported_terminal_is_fatal() {
        let mut canvas = CellCanvas::new(80, 24).with_color_support(false);
        let mut dir = MemoryDirectory::demo();
        let mut dash = Dashboard::new(
            ThemeManager::new(SchemeStore::builtin()),
            DashboardOptions::default(),
            Box::new(ManualClock::default()),
        );
        assert!(matches!(
            dash.init(&mut canvas, &mut dir),
            Err(DashboardError::UnsupportedTerminal)
        ));
    }
}

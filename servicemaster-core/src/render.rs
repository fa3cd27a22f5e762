//! Row and header rendering
//!
//! Rows are drawn column by column: each column's cells are blanked first and
//! the field written after, so a shorter value never leaves stale characters
//! behind. Column separators are owned by the header pass.

use crate::canvas::{Canvas, CellStyle};
use crate::layout::{CATEGORIES_LEGEND, FUNCTIONS_LEGEND, STATUS_COLUMN_WIDTH, ScreenLayout};
use crate::modal::{BoxGeometry, draw_frame};
use crate::sort::{SortColumn, SortOrder};
use crate::theme::Palette;
use crate::unit::{Scope, UnitFilter, UnitRecord};

pub const HEADLINE: &str = concat!("ServiceMaster ", env!("CARGO_PKG_VERSION"));

pub const QUIT_HINT: &str = "Q/ESC:Quit";

pub const SCOPE_HINT: &str = "Space: User/System";

const ELLIPSIS: &str = "...";

const NAV_SEPARATOR: &str = " | ";

/// Longest state value shown unabridged
const STATE_MAX: usize = 9;

/// Segments of the navigation legend; the theme segment comes last
fn navigation_segments(theme_name: &str) -> Vec<String> {
    vec![
        "Left/Right: Mode".to_string(),
        "Up/Down: Select".to_string(),
        "Return: Status".to_string(),
        "F: Find".to_string(),
        "Tab: Sort".to_string(),
        format!("+/-: Theme ({theme_name})"),
    ]
}

/// Navigation legend of the title line, naming the active theme
pub fn navigation_hint(theme_name: &str) -> String {
    navigation_segments(theme_name).join(NAV_SEPARATOR)
}

/// Navigation legend that fits in `room` cells. Leading segments are dropped
/// first, so the theme name stays visible as long as possible.
pub fn fitted_navigation_hint(theme_name: &str, room: usize) -> String {
    let segments = navigation_segments(theme_name);
    for skip in 0..segments.len() {
        let hint = segments[skip..].join(NAV_SEPARATOR);
        if char_len(&hint) <= room {
            return hint;
        }
    }
    segments
        .last()
        .map(|theme| prefix(theme, room))
        .unwrap_or_default()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn prefix(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

fn width_of(s: &str) -> u16 {
    u16::try_from(char_len(s)).unwrap_or(u16::MAX)
}

/// Write `text` at `(x, y)` without reaching column `end`
fn write_clipped(canvas: &mut dyn Canvas, x: u16, y: u16, text: &str, end: u16) {
    if x >= end {
        return;
    }
    canvas.write_at(x, y, &prefix(text, usize::from(end - x)));
}

/// State column text: enable state (or load state) cut to nine cells
pub fn state_text(unit: &UnitRecord) -> String {
    let state = unit.display_state();
    if char_len(state) > STATE_MAX {
        format!("{}…", prefix(state, STATE_MAX - 1))
    } else {
        state.to_string()
    }
}

fn draw_name(canvas: &mut dyn Canvas, layout: &ScreenLayout, y: u16, name: &str) {
    let cols = &layout.columns;
    canvas.clear_region(cols.name_start, y, cols.name_width(), 1);
    let threshold = usize::from(cols.state_start.saturating_sub(3));
    if char_len(name) >= threshold {
        let ellipsis_at = cols.state_start.saturating_sub(4);
        let keep = usize::from(ellipsis_at.saturating_sub(cols.name_start));
        canvas.write_at(cols.name_start, y, &prefix(name, keep));
        canvas.write_at(ellipsis_at, y, ELLIPSIS);
    } else {
        canvas.write_at(cols.name_start, y, name);
    }
}

fn draw_status_field(canvas: &mut dyn Canvas, x: u16, y: u16, value: &str) {
    let room = STATUS_COLUMN_WIDTH - 1;
    canvas.clear_region(x, y, room, 1);
    canvas.write_at(x, y, &prefix(value, usize::from(room)));
}

fn draw_description(canvas: &mut dyn Canvas, layout: &ScreenLayout, y: u16, text: &str) {
    let start = layout.columns.description_start;
    let max = usize::from(layout.width.saturating_sub(start + 1));
    canvas.clear_region(start, y, layout.width.saturating_sub(start + 1), 1);
    if char_len(text) >= max {
        let keep = max.saturating_sub(3);
        canvas.write_at(start, y, &prefix(text, keep));
        if max >= 3 {
            canvas.write_at(start + width_of(&prefix(text, keep)), y, ELLIPSIS);
        }
    } else {
        canvas.write_at(start, y, text);
    }
}

/// Draw one unit at screen row `y`
pub fn draw_row(
    canvas: &mut dyn Canvas,
    layout: &ScreenLayout,
    unit: &UnitRecord,
    y: u16,
    style: CellStyle,
) {
    let cols = layout.columns;
    canvas.set_style(style);
    draw_name(canvas, layout, y, &unit.name);
    draw_status_field(canvas, cols.state_start, y, &state_text(unit));
    draw_status_field(canvas, cols.active_start, y, &unit.active);
    draw_status_field(canvas, cols.sub_start, y, &unit.sub);
    draw_description(canvas, layout, y, &unit.description);
}

/// Everything the header shows besides the static legends
#[derive(Clone, Debug)]
pub struct HeaderInfo<'a> {
    pub scope: Scope,
    pub filter: UnitFilter,
    /// Units matching the filter
    pub count: usize,
    /// Absolute index of the selected unit in the filtered list
    pub position: usize,
    pub theme_name: &'a str,
    /// Column picked in header-highlight mode
    pub highlighted: Option<SortColumn>,
    pub sort: SortOrder,
}

fn column_start(layout: &ScreenLayout, column: SortColumn) -> u16 {
    let cols = &layout.columns;
    match column {
        SortColumn::Name => cols.name_start,
        SortColumn::State => cols.state_start,
        SortColumn::Active => cols.active_start,
        SortColumn::Sub => cols.sub_start,
        SortColumn::Description => cols.description_start,
    }
}

fn draw_title_line(
    canvas: &mut dyn Canvas,
    layout: &ScreenLayout,
    palette: &Palette,
    theme: &str,
) {
    let inner_end = layout.width.saturating_sub(1);
    canvas.set_style(palette.title_style());
    write_clipped(canvas, 1, 1, HEADLINE, inner_end);

    let quit_x = inner_end.saturating_sub(width_of(QUIT_HINT));
    let nav_start = width_of(HEADLINE) + 2;
    if quit_x > width_of(HEADLINE) + 1 {
        canvas.write_at(quit_x, 1, QUIT_HINT);
    }
    let room = quit_x.saturating_sub(1).saturating_sub(nav_start);
    if room == 0 {
        return;
    }
    let nav = fitted_navigation_hint(theme, usize::from(room));
    let spare = room.saturating_sub(width_of(&nav));
    canvas.write_at(nav_start + spare / 2, 1, &nav);
}

fn draw_legends(canvas: &mut dyn Canvas, layout: &ScreenLayout, palette: &Palette) {
    let inner_end = layout.width.saturating_sub(1);
    canvas.set_style(palette.header_style());
    write_clipped(canvas, 1, 2, FUNCTIONS_LEGEND, inner_end);
    canvas.set_style(palette.legend_style());
    if layout.narrow {
        write_clipped(canvas, 1, 3, CATEGORIES_LEGEND, inner_end);
    } else {
        let x = layout.width.saturating_sub(width_of(CATEGORIES_LEGEND) + 1);
        write_clipped(canvas, x, 2, CATEGORIES_LEGEND, inner_end);
    }
}

fn draw_column_headers(
    canvas: &mut dyn Canvas,
    layout: &ScreenLayout,
    palette: &Palette,
    info: &HeaderInfo<'_>,
) {
    let row = layout.header_row;
    let cols = &layout.columns;
    let inner_end = layout.width.saturating_sub(1);

    let mut column = SortColumn::Name;
    let mut name_label_end = cols.name_start;
    for _ in 0..5 {
        let mut label = column.label().to_string();
        if let Some(dir) = info.sort.direction_of(column) {
            label.push(dir.arrow());
        }
        let x = column_start(layout, column);
        if column == SortColumn::Name {
            name_label_end = x + width_of(&label);
        }
        canvas.set_style(palette.column_header_style(info.highlighted == Some(column)));
        write_clipped(canvas, x, row, &label, inner_end);
        column = column.next();
    }

    // Name column tail: scope tag, scope hint, unit count, position.
    // The hint goes first when space runs out, then the count.
    let name_end = cols.state_start.saturating_sub(1);
    let pos = format!("Pos.:{:3}", info.position);
    let pos_x = name_end.saturating_sub(width_of(&pos) + 1);
    let left = name_label_end + 1;
    let pos_fits = pos_x > left;
    let limit = if pos_fits { pos_x - 1 } else { name_end };

    let mut parts = vec![
        (format!("({})", info.scope.label()), palette.accent_style()),
        (SCOPE_HINT.to_string(), palette.title_style()),
        (
            format!("{}: {}", info.filter.label(), info.count),
            palette.count_style(),
        ),
    ];
    let span = |parts: &[(String, CellStyle)]| -> usize {
        parts.iter().map(|(t, _)| char_len(t) + 1).sum::<usize>() - 1
    };
    let room = usize::from(limit.saturating_sub(left));
    while parts.len() > 1 && span(&parts) > room {
        parts.remove(1);
    }

    let mut x = left;
    for (text, style) in &parts {
        canvas.set_style(*style);
        write_clipped(canvas, x, row, text, limit);
        x = x.saturating_add(width_of(text) + 1);
    }
    if pos_fits {
        canvas.set_style(palette.title_style());
        canvas.write_at(pos_x, row, &pos);
    }
}

fn draw_lines(canvas: &mut dyn Canvas, layout: &ScreenLayout, palette: &Palette) {
    let (w, h) = (layout.width, layout.height);
    let rule_row = layout.header_row + 1;
    canvas.set_style(palette.text_style());
    canvas.write_at(1, rule_row, &"─".repeat(usize::from(w.saturating_sub(2))));
    for x in layout.columns.separators() {
        if x == 0 || x + 1 >= w {
            continue;
        }
        for y in layout.header_row..h.saturating_sub(1) {
            let glyph = if y == rule_row { "┼" } else { "│" };
            canvas.write_at(x, y, glyph);
        }
    }
}

/// Draw the frame, legends, column headers and separators
pub fn draw_header(
    canvas: &mut dyn Canvas,
    layout: &ScreenLayout,
    palette: &Palette,
    info: &HeaderInfo<'_>,
) {
    canvas.set_style(palette.text_style());
    draw_frame(
        canvas,
        BoxGeometry {
            x: 0,
            y: 0,
            width: layout.width,
            height: layout.height,
        },
    );
    draw_title_line(canvas, layout, palette, info.theme_name);
    draw_legends(canvas, layout, palette);
    draw_column_headers(canvas, layout, palette, info);
    draw_lines(canvas, layout, palette);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::CellCanvas;
    use crate::sort::Direction;
    use crate::unit::UnitCategory;

    fn record(name: &str, state: Option<&str>, desc: &str) -> UnitRecord {
        UnitRecord::new(name, "loaded", state.map(String::from), "active", "running", desc)
            .unwrap()
    }

    fn setup(w: u16) -> (CellCanvas, ScreenLayout) {
        (CellCanvas::new(w, 30), ScreenLayout::new(w, 30))
    }

    #[test]
    fn test_long_name_gets_ellipsis() {
        let (mut canvas, layout) = setup(200);
        let state_start = layout.columns.state_start;
        let name = format!("{}.service", "x".repeat(usize::from(state_start)));
        draw_row(&mut canvas, &layout, &record(&name, None, ""), 5, CellStyle::default());

        let cell = canvas.text_at(1, 5, state_start - 2);
        assert!(cell.ends_with("..."));
        assert_eq!(canvas.text_at(state_start - 4, 5, 3), "...");
        assert_eq!(canvas.text_at(state_start - 5, 5, 1), "x");
        assert_eq!(cell.matches('.').count(), 3);
    }

    #[test]
    fn test_name_below_threshold_is_unmodified() {
        let (mut canvas, layout) = setup(200);
        let threshold = usize::from(layout.columns.state_start - 3);
        let base = "a".repeat(threshold - 1 - ".service".len());
        let name = format!("{base}.service");
        assert_eq!(name.len(), threshold - 1);
        draw_row(&mut canvas, &layout, &record(&name, None, ""), 5, CellStyle::default());
        assert_eq!(canvas.text_at(1, 5, name.len() as u16), name);
    }

    #[test]
    fn test_state_falls_back_and_truncates() {
        assert_eq!(state_text(&record("a.scope", None, "")), "loaded");
        assert_eq!(state_text(&record("a.service", Some(""), "")), "loaded");
        assert_eq!(
            state_text(&record("a.service", Some("enabled-runtime"), "")),
            "enabled-…"
        );
        assert_eq!(state_text(&record("a.service", Some("static"), "")), "static");
    }

    #[test]
    fn test_description_truncated_to_width() {
        let (mut canvas, layout) = setup(80);
        let start = layout.columns.description_start;
        let desc = "d".repeat(100);
        draw_row(&mut canvas, &layout, &record("a.service", None, &desc), 6, CellStyle::default());
        let max = 80 - start - 1;
        assert_eq!(canvas.text_at(start + max - 3, 6, 3), "...");
        // right border column stays untouched
        assert_eq!(canvas.text_at(79, 6, 1), " ");
    }

    #[test]
    fn test_redraw_clears_stale_text() {
        let (mut canvas, layout) = setup(200);
        let mut unit = record("a.service", Some("disabled"), "first description");
        draw_row(&mut canvas, &layout, &unit, 7, CellStyle::default());
        unit.enable_state = Some("static".into());
        unit.description = "short".into();
        draw_row(&mut canvas, &layout, &unit, 7, CellStyle::default());
        assert_eq!(canvas.text_at(layout.columns.state_start, 7, 9), "static   ");
        let desc = canvas.text_at(layout.columns.description_start, 7, 17);
        assert_eq!(desc, "short            ");
    }

    #[test]
    fn test_header_contents() {
        let (mut canvas, layout) = setup(200);
        let info = HeaderInfo {
            scope: Scope::System,
            filter: UnitFilter::Only(UnitCategory::Service),
            count: 42,
            position: 7,
            theme_name: "Dracula",
            highlighted: Some(SortColumn::Active),
            sort: SortOrder::Column(SortColumn::State, Direction::Descending),
        };
        let palette = Palette::default();
        draw_header(&mut canvas, &layout, &palette, &info);

        let row = layout.header_row;
        let text = canvas.row_text(row);
        assert!(canvas.row_text(1).contains(HEADLINE));
        assert!(canvas.row_text(1).contains("Theme (Dracula)"));
        assert!(text.contains("(SYSTEM)"));
        assert!(text.contains("Service: 42"));
        assert!(text.contains("Pos.:  7"));
        assert!(text.contains("STATE:▼"));
        assert!(canvas.row_text(2).contains(CATEGORIES_LEGEND));

        let active = canvas.cell(layout.columns.active_start, row).unwrap();
        assert_eq!(active.style, palette.column_header_style(true));
        let state = canvas.cell(layout.columns.state_start, row).unwrap();
        assert_eq!(state.style, palette.column_header_style(false));

        let sep = layout.columns.state_start - 1;
        assert_eq!(canvas.text_at(sep, row + 3, 1), "│");
    }

    #[test]
    fn test_narrow_header_moves_category_legend() {
        let (mut canvas, layout) = setup(120);
        let info = HeaderInfo {
            scope: Scope::User,
            filter: UnitFilter::All,
            count: 3,
            position: 0,
            theme_name: "Default",
            highlighted: None,
            sort: SortOrder::None,
        };
        draw_header(&mut canvas, &layout, &Palette::default(), &info);
        assert!(canvas.row_text(3).contains("A:ALL D:DEV"));
        assert!(!canvas.row_text(2).contains("A:ALL"));
        assert!(canvas.row_text(layout.header_row).contains("(USER)"));
    }

    fn service_info(theme_name: &str) -> HeaderInfo<'_> {
        HeaderInfo {
            scope: Scope::System,
            filter: UnitFilter::Only(UnitCategory::Service),
            count: 42,
            position: 7,
            theme_name,
            highlighted: None,
            sort: SortOrder::None,
        }
    }

    #[test]
    fn test_header_fits_80_columns() {
        let mut canvas = CellCanvas::new(80, 24);
        let layout = ScreenLayout::new(80, 24);
        draw_header(&mut canvas, &layout, &Palette::default(), &service_info("Dracula"));

        let title = canvas.row_text(1);
        assert!(title.contains(HEADLINE));
        assert!(title.contains("+/-: Theme (Dracula)"));
        assert!(title.contains(QUIT_HINT));
        assert!(!title.contains("Left/Right"));
        for y in 1..layout.header_row + 1 {
            assert_eq!(canvas.text_at(0, y, 1), "│");
            assert_eq!(canvas.text_at(79, y, 1), "│");
        }

        let row = layout.header_row;
        let text = canvas.row_text(row);
        assert!(text.contains("UNIT: (SYSTEM) Service: 42"));
        assert!(!text.contains(SCOPE_HINT));
        let pos_x = text.chars().position(|c| c == 'P').unwrap() as u16;
        assert_eq!(canvas.text_at(pos_x, row, 8), "Pos.:  7");
        assert!(pos_x + 8 < layout.columns.state_start);
        assert_eq!(canvas.text_at(layout.columns.state_start, row, 6), "STATE:");
    }

    #[test]
    fn test_header_keeps_theme_name_at_120_columns() {
        let (mut canvas, layout) = setup(120);
        draw_header(&mut canvas, &layout, &Palette::default(), &service_info("Solarized Light"));
        let title = canvas.row_text(1);
        assert!(title.contains("Theme (Solarized Light)"));
        assert!(title.contains(QUIT_HINT));
        assert_eq!(canvas.text_at(119, 1, 1), "│");
        assert!(canvas.row_text(layout.header_row).contains(SCOPE_HINT));
    }

    #[test]
    fn test_fitted_navigation_hint_drops_leading_segments() {
        let full = navigation_hint("Default");
        assert_eq!(fitted_navigation_hint("Default", 500), full);
        assert_eq!(fitted_navigation_hint("Default", 40), "Tab: Sort | +/-: Theme (Default)");
        assert_eq!(fitted_navigation_hint("Default", 8), "+/-: The");
        assert_eq!(fitted_navigation_hint("Default", 0), "");
    }
}

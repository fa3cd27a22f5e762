//! Screen geometry: column boundaries and header/body rows

use tracing::debug;

/// Minimum width of the unit name column
pub const MIN_NAME_WIDTH: u16 = 20;

/// Width of each status column (state, active, sub) including its separator
pub const STATUS_COLUMN_WIDTH: u16 = 10;

/// First cell of the unit name column (inside the border)
pub const NAME_START: u16 = 1;

/// Function-key legend drawn on the second header line
pub const FUNCTIONS_LEGEND: &str =
    "F1:START F2:STOP F3:RESTART F4:ENABLE F5:DISABLE F6:MASK F7:UNMASK F8:RELOAD";

/// Category legend; moves to its own line on narrow terminals
pub const CATEGORIES_LEGEND: &str =
    "A:ALL D:DEV I:SLICE S:SERVICE O:SOCKET T:TARGET R:TIMER M:MOUNT C:SCOPE N:AMOUNT W:SWAP P:PATH H:SSHOT";

/// Column start positions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Columns {
    pub name_start: u16,
    pub state_start: u16,
    pub active_start: u16,
    pub sub_start: u16,
    pub description_start: u16,
}

impl Columns {
    /// Cells available to the name column, separator excluded
    pub fn name_width(&self) -> u16 {
        self.state_start - self.name_start - 1
    }

    /// Separator positions, one left of each column after the name
    pub fn separators(&self) -> [u16; 4] {
        [
            self.state_start - 1,
            self.active_start - 1,
            self.sub_start - 1,
            self.description_start - 1,
        ]
    }
}

/// Compute column boundaries for a terminal `total_width` cells wide.
///
/// The name column gets half the width, at least `MIN_NAME_WIDTH`; when the
/// description would start at or past `total_width - 1`, the name column gives
/// up the excess first, never shrinking below the minimum.
pub fn compute_columns(total_width: u16) -> Columns {
    let mut name_width = (total_width / 2).max(MIN_NAME_WIDTH);
    let status_total = STATUS_COLUMN_WIDTH * 3;
    // separator after the name column
    let description_start = |name: u16| NAME_START + name + 1 + status_total;

    let limit = total_width.saturating_sub(2);
    let start = description_start(name_width);
    if start > limit {
        let excess = start - limit;
        name_width = name_width.saturating_sub(excess).max(MIN_NAME_WIDTH);
    }

    let state_start = NAME_START + name_width + 1;
    let columns = Columns {
        name_start: NAME_START,
        state_start,
        active_start: state_start + STATUS_COLUMN_WIDTH,
        sub_start: state_start + STATUS_COLUMN_WIDTH * 2,
        description_start: state_start + STATUS_COLUMN_WIDTH * 3,
    };
    debug!(total_width, ?columns, "computed columns");
    columns
}

/// Everything that depends on the terminal size
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScreenLayout {
    pub width: u16,
    pub height: u16,
    pub columns: Columns,
    /// Category legend gets its own line
    pub narrow: bool,
    /// Row of the column headers
    pub header_row: u16,
    /// First row of the unit list
    pub body_top: u16,
    /// Number of unit rows that fit
    pub page_height: usize,
}

impl ScreenLayout {
    pub fn new(width: u16, height: u16) -> Self {
        let legend_width = FUNCTIONS_LEGEND.len() + CATEGORIES_LEGEND.len() + 2;
        let narrow = usize::from(width) < legend_width;
        let header_row = if narrow { 4 } else { 3 };
        // separator line and a spacer below the column headers
        let body_top = header_row + 2;
        let page_height = usize::from(height.saturating_sub(body_top + 1)).max(1);
        Self {
            width,
            height,
            columns: compute_columns(width),
            narrow,
            header_row,
            body_top,
            page_height,
        }
    }
}

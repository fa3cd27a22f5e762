//! Character-cell canvas abstraction
//!
//! Everything the dashboard draws goes through [`Canvas`], so the renderers and
//! the input state machine run the same against a real terminal or the
//! in-memory [`CellCanvas`].

use thiserror::Error;

use crate::config::BaseColor;

#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("your terminal does not support changing colors")]
    ColorsUnsupported,
    #[error("terminal I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Foreground/background combination of two base colors
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ColorPair {
    pub fg: BaseColor,
    pub bg: BaseColor,
}

impl ColorPair {
    pub const fn new(fg: BaseColor, bg: BaseColor) -> Self {
        Self { fg, bg }
    }
}

impl Default for ColorPair {
    fn default() -> Self {
        Self::new(BaseColor::White, BaseColor::Black)
    }
}

/// Attributes applied to subsequent writes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct CellStyle {
    pub pair: ColorPair,
    pub bold: bool,
    pub underline: bool,
}

impl CellStyle {
    pub const fn new(pair: ColorPair) -> Self {
        Self {
            pair,
            bold: false,
            underline: false,
        }
    }

    pub const fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub const fn underlined(mut self) -> Self {
        self.underline = true;
        self
    }
}

/// Drawing capability the dashboard needs from a terminal.
///
/// Coordinates are `(x, y)` in cells; writes outside the canvas are clipped.
pub trait Canvas {
    /// `(width, height)` in cells
    fn size(&self) -> (u16, u16);

    /// Style used by the following `write_at`/`clear_region` calls
    fn set_style(&mut self, style: CellStyle);

    fn write_at(&mut self, x: u16, y: u16, text: &str);

    /// Blank-fill a rectangle with the current style
    fn clear_region(&mut self, x: u16, y: u16, width: u16, height: u16);

    /// Blank the whole canvas with the default style
    fn erase(&mut self);

    /// Whether `define_color` can take effect on this terminal
    fn can_change_color(&self) -> bool;

    /// Redefine a color register; channels are in the 0..=1000 range
    fn define_color(&mut self, color: BaseColor, rgb: [u16; 3]) -> Result<(), CanvasError>;

    /// Push pending changes to the screen
    fn flush(&mut self) -> Result<(), CanvasError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub style: CellStyle,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            style: CellStyle::default(),
        }
    }
}

/// In-memory grid of styled cells
#[derive(Clone, Debug)]
pub struct CellCanvas {
    width: u16,
    height: u16,
    cells: Vec<Cell>,
    style: CellStyle,
    registers: [[u16; 3]; 8],
    color_capable: bool,
    flushes: usize,
}

impl CellCanvas {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::default(); usize::from(width) * usize::from(height)],
            style: CellStyle::default(),
            registers: [[0; 3]; 8],
            color_capable: true,
            flushes: 0,
        }
    }

    pub fn with_color_support(mut self, capable: bool) -> Self {
        self.color_capable = capable;
        self
    }

    /// Resize, discarding the current contents
    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.cells = vec![Cell::default(); usize::from(width) * usize::from(height)];
    }

    pub fn cell(&self, x: u16, y: u16) -> Option<&Cell> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.cells
            .get(usize::from(y) * usize::from(self.width) + usize::from(x))
    }

    /// Text of one row, trailing blanks included
    pub fn row_text(&self, y: u16) -> String {
        (0..self.width)
            .filter_map(|x| self.cell(x, y).map(|c| c.ch))
            .collect()
    }

    /// Text of `width` cells starting at `(x, y)`
    pub fn text_at(&self, x: u16, y: u16, width: u16) -> String {
        (x..x.saturating_add(width))
            .filter_map(|cx| self.cell(cx, y).map(|c| c.ch))
            .collect()
    }

    /// Whole screen as lines, for assertions
    pub fn contents(&self) -> String {
        (0..self.height)
            .map(|y| self.row_text(y))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn register(&self, color: BaseColor) -> [u16; 3] {
        self.registers[color.index()]
    }

    pub fn flush_count(&self) -> usize {
        self.flushes
    }

    fn put(&mut self, x: u16, y: u16, ch: char) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = usize::from(y) * usize::from(self.width) + usize::from(x);
        if let Some(cell) = self.cells.get_mut(idx) {
            *cell = Cell {
                ch,
                style: self.style,
            };
        }
    }
}

impl Canvas for CellCanvas {
    fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    fn set_style(&mut self, style: CellStyle) {
        self.style = style;
    }

    fn write_at(&mut self, x: u16, y: u16, text: &str) {
        let mut cx = x;
        for ch in text.chars() {
            if cx >= self.width {
                break;
            }
            // Control characters would break the grid
            let ch = if ch.is_control() { ' ' } else { ch };
            self.put(cx, y, ch);
            cx += 1;
        }
    }

    fn clear_region(&mut self, x: u16, y: u16, width: u16, height: u16) {
        for cy in y..y.saturating_add(height) {
            for cx in x..x.saturating_add(width) {
                self.put(cx, cy, ' ');
            }
        }
    }

    fn erase(&mut self) {
        self.cells.fill(Cell::default());
    }

    fn can_change_color(&self) -> bool {
        self.color_capable
    }

    fn define_color(&mut self, color: BaseColor, rgb: [u16; 3]) -> Result<(), CanvasError> {
        if !self.color_capable {
            return Err(CanvasError::ColorsUnsupported);
        }
        self.registers[color.index()] = rgb;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), CanvasError> {
        self.flushes += 1;
        Ok(())
    }
}

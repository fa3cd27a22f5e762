//! Terminal canvas backed by crossterm and ratatui
//!
//! The dashboard draws into an in-memory `CellCanvas`; `flush` copies that
//! grid into a ratatui frame so only the changed cells reach the terminal.
//! The eight color registers are emulated and rendered as 24-bit colors.

use std::io::{self, Stdout};

use crossterm::{
    cursor, execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    style::{Color, Modifier, Style},
};
use servicemaster_core::canvas::{Canvas, CanvasError, CellCanvas, CellStyle};
use servicemaster_core::config::BaseColor;

pub type Tui = Terminal<CrosstermBackend<Stdout>>;

// --- Terminal setup/teardown ---
pub fn setup_terminal() -> io::Result<Tui> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, cursor::Hide)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend)
}

pub fn restore_terminal(mut terminal: Tui) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Leave raw mode before the default hook prints the panic message
pub fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, cursor::Show);
        default_hook(info);
    }));
}

/// Whether the terminal can show redefined colors
pub fn detect_color_support() -> bool {
    supports_color(
        std::env::var("COLORTERM").ok().as_deref(),
        std::env::var("TERM").ok().as_deref(),
    )
}

fn supports_color(colorterm: Option<&str>, term: Option<&str>) -> bool {
    if matches!(colorterm, Some("truecolor" | "24bit")) {
        return true;
    }
    term.is_some_and(|t| t.contains("256color") || t.contains("direct"))
}

/// Register value (0..=1000 per channel) as a 24-bit color
fn register_color(register: [u16; 3]) -> Color {
    let [r, g, b] = register.map(|c| {
        let scaled = (u32::from(c.min(1000)) * 255 + 500) / 1000;
        u8::try_from(scaled).unwrap_or(u8::MAX)
    });
    Color::Rgb(r, g, b)
}

fn cell_style(style: CellStyle, back: &CellCanvas) -> Style {
    let mut out = Style::default()
        .fg(register_color(back.register(style.pair.fg)))
        .bg(register_color(back.register(style.pair.bg)));
    if style.bold {
        out = out.add_modifier(Modifier::BOLD);
    }
    if style.underline {
        out = out.add_modifier(Modifier::UNDERLINED);
    }
    out
}

pub struct TerminalCanvas {
    terminal: Tui,
    back: CellCanvas,
}

impl TerminalCanvas {
    pub fn new(terminal: Tui, width: u16, height: u16) -> Self {
        let back = CellCanvas::new(width, height).with_color_support(detect_color_support());
        Self { terminal, back }
    }

    /// Match a new terminal size; capabilities are detected again
    pub fn resize(&mut self, width: u16, height: u16) {
        let registers = BaseColor::ALL.map(|c| self.back.register(c));
        self.back = CellCanvas::new(width, height).with_color_support(detect_color_support());
        for (color, rgb) in BaseColor::ALL.into_iter().zip(registers) {
            let _ = self.back.define_color(color, rgb);
        }
        tracing::debug!(width, height, "terminal canvas resized");
    }

    pub fn into_terminal(self) -> Tui {
        self.terminal
    }
}

impl Canvas for TerminalCanvas {
    fn size(&self) -> (u16, u16) {
        self.back.size()
    }

    fn set_style(&mut self, style: CellStyle) {
        self.back.set_style(style);
    }

    fn write_at(&mut self, x: u16, y: u16, text: &str) {
        self.back.write_at(x, y, text);
    }

    fn clear_region(&mut self, x: u16, y: u16, width: u16, height: u16) {
        self.back.clear_region(x, y, width, height);
    }

    fn erase(&mut self) {
        self.back.erase();
    }

    fn can_change_color(&self) -> bool {
        self.back.can_change_color()
    }

    fn define_color(&mut self, color: BaseColor, rgb: [u16; 3]) -> Result<(), CanvasError> {
        self.back.define_color(color, rgb)
    }

    fn flush(&mut self) -> Result<(), CanvasError> {
        let back = &self.back;
        let (width, height) = back.size();
        self.terminal.draw(|frame| {
            let area = frame.area();
            let buf = frame.buffer_mut();
            for y in 0..height.min(area.height) {
                for x in 0..width.min(area.width) {
                    let (Some(cell), Some(target)) = (back.cell(x, y), buf.cell_mut((x, y)))
                    else {
                        continue;
                    };
                    target.set_char(cell.ch);
                    target.set_style(cell_style(cell.style, back));
                }
            }
        })?;
        Ok(())
    }
}

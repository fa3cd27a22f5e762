//! Centered pop-up boxes: status messages, yes/no confirmation, search input

use crate::canvas::Canvas;
use crate::search::SearchInput;
use crate::theme::Palette;

/// Inner width of the search box
pub const SEARCH_BOX_WIDTH: u16 = 40;

/// Title of the search box
pub const SEARCH_TITLE: &str = "Search:";

/// What a confirmed yes/no modal asks the caller to do
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfirmAction {
    /// Restart the program under an elevation helper
    Elevate,
}

/// Overlay currently covering the list
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Modal {
    /// Dismissed by any key
    Status { title: String, text: String },
    /// Answered with `y` or `n`
    Confirm {
        title: String,
        text: String,
        action: ConfirmAction,
    },
}

impl Modal {
    pub fn status(title: impl Into<String>, text: impl Into<String>) -> Self {
        Modal::Status {
            title: title.into(),
            text: text.into(),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Modal::Status { title, .. } | Modal::Confirm { title, .. } => title,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Modal::Status { text, .. } | Modal::Confirm { text, .. } => text,
        }
    }

    pub fn draw(&self, canvas: &mut dyn Canvas, palette: &Palette) {
        draw_text_box(canvas, palette, self.title(), self.text());
    }
}

/// Placement of a box on screen
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoxGeometry {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

/// Center a box around `inner_width` x `lines` of content, clipped to the screen
pub fn centered(screen: (u16, u16), inner_width: usize, lines: usize) -> BoxGeometry {
    let (sw, sh) = screen;
    let width = u16::try_from(inner_width + 4).unwrap_or(u16::MAX).min(sw);
    let height = u16::try_from(lines + 2).unwrap_or(u16::MAX).min(sh);
    BoxGeometry {
        x: (sw - width) / 2,
        y: (sh - height) / 2,
        width,
        height,
    }
}

/// Single-line frame with box-drawing characters
pub fn draw_frame(canvas: &mut dyn Canvas, area: BoxGeometry) {
    let BoxGeometry {
        x,
        y,
        width,
        height,
    } = area;
    if width < 2 || height < 2 {
        return;
    }
    let inner = usize::from(width - 2);
    let bottom = y + height - 1;
    let right = x + width - 1;
    canvas.write_at(x, y, &format!("┌{}┐", "─".repeat(inner)));
    canvas.write_at(x, bottom, &format!("└{}┘", "─".repeat(inner)));
    for row in y + 1..bottom {
        canvas.write_at(x, row, "│");
        canvas.write_at(right, row, "│");
    }
}

fn draw_title(canvas: &mut dyn Canvas, palette: &Palette, area: BoxGeometry, title: &str) {
    let len = u16::try_from(title.chars().count()).unwrap_or(u16::MAX);
    let tx = area.x + (area.width / 2).saturating_sub(len / 2);
    canvas.set_style(palette.modal_title_style());
    canvas.write_at(tx, area.y, title);
}

/// Draw a boxed message; one-line messages use the alert color
pub fn draw_text_box(canvas: &mut dyn Canvas, palette: &Palette, title: &str, text: &str) {
    let lines: Vec<&str> = text.split('\n').collect();
    let longest = lines
        .iter()
        .map(|l| l.chars().count())
        .max()
        .unwrap_or(0)
        .max(title.chars().count());
    let area = centered(canvas.size(), longest, lines.len());

    canvas.set_style(palette.text_style());
    canvas.clear_region(area.x, area.y, area.width, area.height);
    draw_frame(canvas, area);
    draw_title(canvas, palette, area, title);

    let body_style = if lines.len() == 1 {
        palette.alert_style()
    } else {
        palette.title_style()
    };
    canvas.set_style(body_style);
    let room = usize::from(area.width.saturating_sub(4));
    let last_row = area.y + area.height.saturating_sub(1);
    for (row, line) in (area.y + 1..last_row).zip(lines) {
        let clipped: String = line.chars().take(room).collect();
        canvas.write_at(area.x + 2, row, &clipped);
    }
}

/// Draw the search box with the tail of the query that fits
pub fn draw_search_box(canvas: &mut dyn Canvas, palette: &Palette, input: &SearchInput) {
    let area = centered(canvas.size(), usize::from(SEARCH_BOX_WIDTH), 1);
    canvas.set_style(palette.text_style());
    canvas.clear_region(area.x, area.y, area.width, area.height);
    draw_frame(canvas, area);
    draw_title(canvas, palette, area, SEARCH_TITLE);

    let room = usize::from(area.width.saturating_sub(4));
    canvas.set_style(palette.prompt_style());
    canvas.write_at(area.x + 2, area.y + 1, input.visible_tail(room));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::CellCanvas;

    #[test]
    fn test_centered_sizes_to_content() {
        let g = centered((100, 40), 20, 3);
        assert_eq!(g, BoxGeometry { x: 38, y: 17, width: 24, height: 5 });
        let clipped = centered((30, 4), 200, 10);
        assert_eq!(clipped, BoxGeometry { x: 0, y: 0, width: 30, height: 4 });
    }

    #[test]
    fn test_status_box_draws_title_and_lines() {
        let mut canvas = CellCanvas::new(60, 12);
        let palette = Palette::default();
        draw_text_box(&mut canvas, &palette, "Status:", "line one\nsecond line");
        let screen = canvas.contents();
        assert!(screen.contains("Status:"));
        assert!(screen.contains("│ line one"));
        assert!(screen.contains("│ second line"));
    }

    #[test]
    fn test_single_line_uses_alert_style() {
        let mut canvas = CellCanvas::new(60, 12);
        let palette = Palette::default();
        draw_text_box(&mut canvas, &palette, "Error:", "No valid service selected.");
        let row = (0..12)
            .find(|&y| canvas.row_text(y).contains("No valid"))
            .unwrap();
        let x = canvas.row_text(row).chars().position(|c| c == 'N').unwrap() as u16;
        assert_eq!(canvas.cell(x, row).unwrap().style, palette.alert_style());
    }

    #[test]
    fn test_search_box_shows_tail() {
        let mut canvas = CellCanvas::new(80, 10);
        let mut input = SearchInput::new();
        for ch in "a-very-long-query-that-does-not-fit-in-the-box-xyz".chars() {
            input.push(ch);
        }
        draw_search_box(&mut canvas, &Palette::default(), &input);
        let screen = canvas.contents();
        assert!(screen.contains("box-xyz"));
        assert!(!screen.contains("a-very"));
    }
}

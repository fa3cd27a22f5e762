//! Theme manager - maps the active color scheme to semantic styles
//!
//! Provides:
//! - Palette of color pairs (not hard-coded colors per call site)
//! - StyleKit helpers for every element the dashboard draws
//! - Color register programming from the active scheme

use tracing::{debug, info};

use crate::canvas::{Canvas, CanvasError, CellStyle, ColorPair};
use crate::config::{BaseColor, ColorScheme, SchemeStore};

use BaseColor::{Black, Blue, Cyan, Green, Red, White, Yellow};

/// Themes that need their own contrast for the row highlight and header legend.
///
/// Keyed by exact scheme name: (name, row highlight, header legend background).
const CONTRAST_OVERRIDES: &[(&str, ColorPair, ColorPair)] = &[
    (
        "Monochrome",
        ColorPair::new(Black, White),
        ColorPair::new(Black, White),
    ),
    (
        "Solarized Light",
        ColorPair::new(Black, Blue),
        ColorPair::new(Black, Red),
    ),
];

/// Color pair tokens for every element
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette {
    /// Body text and borders
    pub text: ColorPair,
    /// Scope tag, category count
    pub accent: ColorPair,
    /// Function-key legend (header background)
    pub header: ColorPair,
    /// Category legend
    pub legend: ColorPair,
    /// Selected row
    pub highlight: ColorPair,
    /// Column header picked for sorting
    pub header_highlight: ColorPair,
    /// One-line modal messages
    pub alert: ColorPair,
    /// Search prompt
    pub prompt: ColorPair,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            text: ColorPair::new(White, Black),
            accent: ColorPair::new(Green, Black),
            header: ColorPair::new(White, Red),
            legend: ColorPair::new(Black, Green),
            highlight: ColorPair::new(White, Blue),
            header_highlight: ColorPair::new(Red, Yellow),
            alert: ColorPair::new(Red, Black),
            prompt: ColorPair::new(Cyan, Black),
        }
    }
}

impl Palette {
    /// Palette for a scheme, honoring the per-name contrast table
    pub fn for_scheme(scheme: &ColorScheme) -> Self {
        let mut palette = Self::default();
        if let Some((_, highlight, header)) = CONTRAST_OVERRIDES
            .iter()
            .find(|(name, _, _)| *name == scheme.name)
        {
            palette.highlight = *highlight;
            palette.header = *header;
        }
        palette
    }

    // ========== StyleKit Helper Functions ==========

    pub fn text_style(&self) -> CellStyle {
        CellStyle::new(self.text)
    }

    pub fn title_style(&self) -> CellStyle {
        CellStyle::new(self.text).bold()
    }

    pub fn accent_style(&self) -> CellStyle {
        CellStyle::new(self.accent).bold()
    }

    /// Category count next to the unit header
    pub fn count_style(&self) -> CellStyle {
        CellStyle::new(self.accent).bold().underlined()
    }

    pub fn header_style(&self) -> CellStyle {
        CellStyle::new(self.header).bold()
    }

    pub fn legend_style(&self) -> CellStyle {
        CellStyle::new(self.legend).bold()
    }

    /// Selected row: bold on the highlight pair
    pub fn selection_style(&self) -> CellStyle {
        CellStyle::new(self.highlight).bold()
    }

    pub fn column_header_style(&self, highlighted: bool) -> CellStyle {
        if highlighted {
            CellStyle::new(self.header_highlight).bold()
        } else {
            self.title_style()
        }
    }

    pub fn modal_title_style(&self) -> CellStyle {
        CellStyle::new(self.text).bold().underlined()
    }

    pub fn alert_style(&self) -> CellStyle {
        CellStyle::new(self.alert).bold()
    }

    pub fn prompt_style(&self) -> CellStyle {
        CellStyle::new(self.prompt).bold()
    }
}

/// Rescale an 8-bit channel to the terminal's 0..=1000 intensity range
pub fn scale_channel(channel: u8) -> u16 {
    // round(channel * 1000 / 255)
    ((u32::from(channel) * 1000 + 127) / 255) as u16
}

/// Direction for theme cycling (`+` / `-`)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cycle {
    Next,
    Prev,
}

/// Owns the scheme store and the palette derived from its active scheme
#[derive(Clone, Debug)]
pub struct ThemeManager {
    store: SchemeStore,
    palette: Palette,
}

impl ThemeManager {
    pub fn new(store: SchemeStore) -> Self {
        let palette = Palette::for_scheme(store.active());
        Self { store, palette }
    }

    pub fn store(&self) -> &SchemeStore {
        &self.store
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn active_index(&self) -> usize {
        self.store.active_index()
    }

    pub fn active_name(&self) -> &str {
        &self.store.active().name
    }

    /// Range-checked; out of range is a no-op
    pub fn set_active(&mut self, index: usize) -> bool {
        let changed = self.store.set_active(index);
        if changed {
            self.palette = Palette::for_scheme(self.store.active());
        }
        changed
    }

    /// Step through the scheme list, clamping at both ends
    pub fn cycle(&mut self, dir: Cycle) -> bool {
        let current = self.store.active_index();
        let target = match dir {
            Cycle::Next => current + 1,
            Cycle::Prev => match current.checked_sub(1) {
                Some(i) => i,
                None => return false,
            },
        };
        self.set_active(target)
    }

    /// Program the terminal's color registers from the active scheme
    pub fn apply(&self, canvas: &mut dyn Canvas) -> Result<(), CanvasError> {
        if !canvas.can_change_color() {
            return Err(CanvasError::ColorsUnsupported);
        }
        let scheme = self.store.active();
        for color in BaseColor::ALL {
            let [r, g, b] = scheme.color(color).channels();
            let scaled = [scale_channel(r), scale_channel(g), scale_channel(b)];
            debug!(color = color.name(), ?scaled, "define color");
            canvas.define_color(color, scaled)?;
        }
        info!(theme = %scheme.name, "color scheme applied");
        Ok(())
    }
}

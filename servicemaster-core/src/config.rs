use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// System-wide configuration file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/servicemaster/servicemaster.toml";

/// Environment variable overriding the configuration path
pub const CONFIG_ENV: &str = "SERVICEMASTER_CONFIG";

/// Configuration used when no file exists
pub const BUILTIN_CONFIG: &str = r#"
actual_colorscheme = "Default"

[[colorschemes]]
name = "Default"
black = [0, 0, 0]
white = [229, 229, 229]
green = [0, 205, 0]
yellow = [205, 205, 0]
red = [205, 0, 0]
magenta = [205, 0, 205]
cyan = [0, 205, 205]
blue = [0, 0, 238]

[[colorschemes]]
name = "Monochrome"
black = [0, 0, 0]
white = [255, 255, 255]
green = [200, 200, 200]
yellow = [220, 220, 220]
red = [170, 170, 170]
magenta = [190, 190, 190]
cyan = [210, 210, 210]
blue = [90, 90, 90]

[[colorschemes]]
name = "Solarized Light"
black = [253, 246, 227]
white = [101, 123, 131]
green = [133, 153, 0]
yellow = [181, 137, 0]
red = [220, 50, 47]
magenta = [211, 54, 130]
cyan = [42, 161, 152]
blue = [38, 139, 210]

[[colorschemes]]
name = "Dracula"
black = [40, 42, 54]
white = [248, 248, 242]
green = [80, 250, 123]
yellow = [241, 250, 140]
red = [255, 85, 85]
magenta = [255, 121, 198]
cyan = [139, 233, 253]
blue = [98, 114, 164]
"#;

/// The eight terminal base colors a scheme redefines
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BaseColor {
    Black,
    White,
    Green,
    Yellow,
    Red,
    Magenta,
    Cyan,
    Blue,
}

impl BaseColor {
    pub const ALL: [BaseColor; 8] = [
        BaseColor::Black,
        BaseColor::White,
        BaseColor::Green,
        BaseColor::Yellow,
        BaseColor::Red,
        BaseColor::Magenta,
        BaseColor::Cyan,
        BaseColor::Blue,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BaseColor::Black => "black",
            BaseColor::White => "white",
            BaseColor::Green => "green",
            BaseColor::Yellow => "yellow",
            BaseColor::Red => "red",
            BaseColor::Magenta => "magenta",
            BaseColor::Cyan => "cyan",
            BaseColor::Blue => "blue",
        }
    }

    /// Position in `ALL`, used as the color register index
    pub fn index(&self) -> usize {
        match self {
            BaseColor::Black => 0,
            BaseColor::White => 1,
            BaseColor::Green => 2,
            BaseColor::Yellow => 3,
            BaseColor::Red => 4,
            BaseColor::Magenta => 5,
            BaseColor::Cyan => 6,
            BaseColor::Blue => 7,
        }
    }
}

/// An RGB triple with 8-bit channels
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn channels(&self) -> [u8; 3] {
        [self.0, self.1, self.2]
    }
}

/// A named 8-color theme
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColorScheme {
    pub name: String,
    /// Indexed by `BaseColor::index`
    pub colors: [Rgb; 8],
}

impl ColorScheme {
    pub fn color(&self, color: BaseColor) -> Rgb {
        self.colors[color.index()]
    }
}

/// Scheme as written in the TOML file; channels are validated after parsing
#[derive(Clone, Debug, Deserialize)]
struct RawScheme {
    name: Option<String>,
    black: Option<Vec<i64>>,
    white: Option<Vec<i64>>,
    green: Option<Vec<i64>>,
    yellow: Option<Vec<i64>>,
    red: Option<Vec<i64>>,
    magenta: Option<Vec<i64>>,
    cyan: Option<Vec<i64>>,
    blue: Option<Vec<i64>>,
}

impl RawScheme {
    fn channel_list(&self, color: BaseColor) -> Option<&Vec<i64>> {
        match color {
            BaseColor::Black => self.black.as_ref(),
            BaseColor::White => self.white.as_ref(),
            BaseColor::Green => self.green.as_ref(),
            BaseColor::Yellow => self.yellow.as_ref(),
            BaseColor::Red => self.red.as_ref(),
            BaseColor::Magenta => self.magenta.as_ref(),
            BaseColor::Cyan => self.cyan.as_ref(),
            BaseColor::Blue => self.blue.as_ref(),
        }
    }
}

/// Root configuration file structure
#[derive(Clone, Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    actual_colorscheme: Option<String>,
    #[serde(default)]
    colorschemes: Option<Vec<RawScheme>>,
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("root 'colorschemes' array not found")]
    MissingSchemes,
    #[error("no color schemes defined")]
    Empty,
    #[error("missing 'name' in scheme {index}")]
    MissingName { index: usize },
    #[error("duplicate scheme name '{name}'")]
    DuplicateName { name: String },
    #[error("missing '{color}' in scheme '{scheme}'")]
    MissingColor { scheme: String, color: &'static str },
    #[error("invalid RGB array length for '{color}' in scheme '{scheme}'")]
    InvalidLength { scheme: String, color: &'static str },
    #[error("invalid RGB value {value} (0-255 allowed) for '{color}' in scheme '{scheme}'")]
    InvalidChannel {
        scheme: String,
        color: &'static str,
        value: i64,
    },
    #[error("missing 'actual_colorscheme' in file")]
    MissingActive,
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_scheme(index: usize, raw: &RawScheme) -> Result<ColorScheme, ConfigError> {
    let name = raw
        .name
        .clone()
        .ok_or(ConfigError::MissingName { index })?;
    let mut colors = [Rgb::default(); 8];
    for color in BaseColor::ALL {
        let list = raw
            .channel_list(color)
            .ok_or_else(|| ConfigError::MissingColor {
                scheme: name.clone(),
                color: color.name(),
            })?;
        if list.len() != 3 {
            return Err(ConfigError::InvalidLength {
                scheme: name.clone(),
                color: color.name(),
            });
        }
        let mut rgb = [0u8; 3];
        for (slot, value) in rgb.iter_mut().zip(list) {
            *slot = u8::try_from(*value).map_err(|_| ConfigError::InvalidChannel {
                scheme: name.clone(),
                color: color.name(),
                value: *value,
            })?;
        }
        colors[color.index()] = Rgb(rgb[0], rgb[1], rgb[2]);
    }
    Ok(ColorScheme { name, colors })
}

/// Parse every color scheme from a TOML document
pub fn schemes_from_str(content: &str) -> Result<Vec<ColorScheme>, ConfigError> {
    let raw: RawConfig = toml::from_str(content)?;
    let list = raw.colorschemes.ok_or(ConfigError::MissingSchemes)?;
    let mut seen = BTreeSet::new();
    let mut schemes = Vec::with_capacity(list.len());
    for (index, raw) in list.iter().enumerate() {
        let scheme = parse_scheme(index, raw)?;
        if !seen.insert(scheme.name.clone()) {
            return Err(ConfigError::DuplicateName { name: scheme.name });
        }
        schemes.push(scheme);
    }
    if schemes.is_empty() {
        return Err(ConfigError::Empty);
    }
    Ok(schemes)
}

/// Read the active scheme name from a TOML document
pub fn active_name_from_str(content: &str) -> Result<String, ConfigError> {
    let raw: RawConfig = toml::from_str(content)?;
    raw.actual_colorscheme.ok_or(ConfigError::MissingActive)
}

/// Load all color schemes from a file
pub fn load(path: &Path) -> Result<Vec<ColorScheme>, ConfigError> {
    schemes_from_str(&read(path)?)
}

/// Load the configured active scheme name from a file
pub fn load_active_name(path: &Path) -> Result<String, ConfigError> {
    active_name_from_str(&read(path)?)
}

/// Pick the configuration path: explicit argument, then environment, then the default
pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    match std::env::var_os(CONFIG_ENV) {
        Some(p) if !p.is_empty() => PathBuf::from(p),
        _ => PathBuf::from(DEFAULT_CONFIG_PATH),
    }
}

/// Ordered color schemes plus the index of the active one.
///
/// Never empty; the active index is always in range.
#[derive(Clone, Debug)]
pub struct SchemeStore {
    schemes: Vec<ColorScheme>,
    active: usize,
}

impl SchemeStore {
    pub fn new(schemes: Vec<ColorScheme>) -> Result<Self, ConfigError> {
        if schemes.is_empty() {
            return Err(ConfigError::Empty);
        }
        Ok(Self { schemes, active: 0 })
    }

    /// The store built from `BUILTIN_CONFIG`
    pub fn builtin() -> Self {
        let schemes = schemes_from_str(BUILTIN_CONFIG).unwrap_or_else(|_| {
            vec![ColorScheme {
                name: "Default".into(),
                colors: [
                    Rgb(0, 0, 0),
                    Rgb(229, 229, 229),
                    Rgb(0, 205, 0),
                    Rgb(205, 205, 0),
                    Rgb(205, 0, 0),
                    Rgb(205, 0, 205),
                    Rgb(0, 205, 205),
                    Rgb(0, 0, 238),
                ],
            }]
        });
        Self { schemes, active: 0 }
    }

    pub fn len(&self) -> usize {
        self.schemes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemes.is_empty()
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn active(&self) -> &ColorScheme {
        &self.schemes[self.active]
    }

    pub fn schemes(&self) -> &[ColorScheme] {
        &self.schemes
    }

    /// Range-checked; out of range is a no-op. Returns whether the index changed.
    pub fn set_active(&mut self, index: usize) -> bool {
        if index >= self.schemes.len() || index == self.active {
            return false;
        }
        self.active = index;
        true
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.schemes.iter().position(|s| s.name == name)
    }
}

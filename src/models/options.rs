use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Named frame colours offered by the upload page.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, EnumString, Display,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum NamedColor {
    #[default]
    Black,
    White,
    Pink,
    Blue,
    Mint,
    Lavender,
    Beige,
}

/// Frame colour: either one of the named presets or a `#rgb` / `#rrggbb` hex code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FrameColor {
    Named(NamedColor),
    Hex(String),
}

impl Default for FrameColor {
    fn default() -> Self {
        FrameColor::Named(NamedColor::default())
    }
}

impl FrameColor {
    /// Parse a colour name or hex code. Anything unrecognised becomes the default black frame.
    pub fn parse_or_default(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Some(hex) = trimmed.strip_prefix('#') {
            if matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return FrameColor::Hex(format!("#{}", hex.to_ascii_lowercase()));
            }
            return FrameColor::default();
        }
        trimmed
            .parse::<NamedColor>()
            .map(FrameColor::Named)
            .unwrap_or_default()
    }

    /// Wording used inside the prompt.
    pub fn describe(&self) -> String {
        match self {
            FrameColor::Named(color) => color.to_string(),
            FrameColor::Hex(code) => format!("solid color {code}"),
        }
    }
}

/// Grid shape of the generated strip.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, EnumString, Display,
)]
#[strum(ascii_case_insensitive)]
pub enum Layout {
    #[default]
    #[strum(serialize = "1x4")]
    #[serde(rename = "1x4")]
    OneByFour,
    #[strum(serialize = "1x3")]
    #[serde(rename = "1x3")]
    OneByThree,
    #[strum(serialize = "2x2")]
    #[serde(rename = "2x2")]
    TwoByTwo,
    #[strum(serialize = "2x3")]
    #[serde(rename = "2x3")]
    TwoByThree,
}

impl Layout {
    /// Full frame size in pixels (width, height).
    pub fn frame_size(self) -> (u32, u32) {
        match self {
            Layout::OneByFour => (1060, 3187),
            Layout::OneByThree => (1060, 2480),
            Layout::TwoByTwo => (2000, 2000),
            Layout::TwoByThree => (2000, 2900),
        }
    }

    pub fn cell_count(self) -> u32 {
        match self {
            Layout::OneByFour => 4,
            Layout::OneByThree => 3,
            Layout::TwoByTwo => 4,
            Layout::TwoByThree => 6,
        }
    }

    pub fn arrangement(self) -> &'static str {
        match self {
            Layout::OneByFour | Layout::OneByThree => "arranged vertically in a single column",
            Layout::TwoByTwo => "arranged in 2 columns and 2 rows",
            Layout::TwoByThree => "arranged in 2 columns and 3 rows",
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, EnumString, Display,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Color,
    Bw,
    Cool,
    Warm,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, EnumString, Display,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    #[default]
    Default,
    Vintage,
    Film,
    Cartoon,
    Watercolor,
}

/// Options that shape the generation prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptOptions {
    pub frame_color: FrameColor,
    pub layout: Layout,
    pub color_mode: ColorMode,
    pub style: Style,
    pub is_duo: bool,
}

impl PromptOptions {
    /// Resolve raw form values, falling back to defaults for missing or unknown values.
    pub fn from_raw(
        frame_color: Option<&str>,
        layout: Option<&str>,
        color_mode: Option<&str>,
        style: Option<&str>,
        is_duo: bool,
    ) -> Self {
        Self {
            frame_color: frame_color
                .map(FrameColor::parse_or_default)
                .unwrap_or_default(),
            layout: parse_or_default(layout),
            color_mode: parse_or_default(color_mode),
            style: parse_or_default(style),
            is_duo,
        }
    }
}

fn parse_or_default<T>(raw: Option<&str>) -> T
where
    T: std::str::FromStr + Default,
{
    raw.map(str::trim)
        .and_then(|value| value.parse().ok())
        .unwrap_or_default()
}

//! # Color
//!
//! Display-space (sRGB, straight alpha) colors as accepted from callers. The render stage
//! consumes these in their normalized `[r, g, b, a]` form.

/// An 8-bit-per-channel sRGB color with straight alpha.
#[derive(Copy, Clone, PartialEq, Eq, Hash, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(transparent)]
pub struct Color([u8; 4]);

impl Color {
    pub const BLACK: Self = Self([0, 0, 0, 255]);
    pub const WHITE: Self = Self([255, 255, 255, 255]);
    pub const TRANSPARENT: Self = Self([0, 0, 0, 0]);

    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 255])
    }
    #[must_use]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self([r, g, b, a])
    }
    #[must_use]
    pub const fn gray(v: u8) -> Self {
        Self([v, v, v, 255])
    }
    #[must_use]
    pub const fn with_alpha(self, a: u8) -> Self {
        let [r, g, b, _] = self.0;
        Self([r, g, b, a])
    }
    #[must_use]
    pub const fn r(self) -> u8 {
        self.0[0]
    }
    #[must_use]
    pub const fn g(self) -> u8 {
        self.0[1]
    }
    #[must_use]
    pub const fn b(self) -> u8 {
        self.0[2]
    }
    #[must_use]
    pub const fn a(self) -> u8 {
        self.0[3]
    }
    #[must_use]
    pub const fn as_array(self) -> [u8; 4] {
        self.0
    }
    /// `#rrggbb`, or `#rrggbbaa` when not opaque.
    #[must_use]
    pub fn hex(self) -> String {
        let [r, g, b, a] = self.0;
        if a == 255 {
            format!("#{r:02x}{g:02x}{b:02x}")
        } else {
            format!("#{r:02x}{g:02x}{b:02x}{a:02x}")
        }
    }
    /// Channels scaled to `[0, 1]`. Opaque colors yield `[r, g, b, 1.0]`.
    #[must_use]
    pub fn normalized(self) -> [f32; 4] {
        self.0.map(|c| f32::from(c) / 255.0)
    }
    /// Quantize normalized channels. Out-of-range and NaN channels are clamped.
    #[must_use]
    pub fn from_normalized(channels: [f32; 4]) -> Self {
        Self(channels.map(|c| {
            let c = if c.is_nan() { 0.0 } else { c.clamp(0.0, 1.0) };
            az::saturating_cast::<f32, u8>((c * 255.0).round())
        }))
    }
    /// Resolve any color string the engine accepts. Malformed input resolves to black,
    /// and is logged rather than reported.
    #[must_use]
    pub fn standardize(text: &str) -> Self {
        text.parse().unwrap_or_else(|err| {
            log::warn!("unrecognized color {text:?} ({err}), using black");
            Self::BLACK
        })
    }
}

impl std::fmt::Debug for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Color({})", self.hex())
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

impl From<[u8; 3]> for Color {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self::rgb(r, g, b)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ColorParseError {
    #[error("empty color string")]
    Empty,
    #[error("bad hex color")]
    BadHex,
    #[error("bad channel list")]
    BadChannels,
    #[error("unknown color name")]
    UnknownName,
}

impl std::str::FromStr for Color {
    type Err = ColorParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ColorParseError::Empty);
        }
        if let Some(hex) = s.strip_prefix('#') {
            return parse_hex(hex);
        }
        let lower = s.to_ascii_lowercase();
        if let Some(args) = lower
            .strip_prefix("rgba(")
            .or_else(|| lower.strip_prefix("rgb("))
        {
            let args = args.strip_suffix(')').ok_or(ColorParseError::BadChannels)?;
            return parse_channels(args);
        }
        NAMED
            .iter()
            .find(|(name, _)| *name == lower)
            .map(|(_, rgb)| Self::from(*rgb))
            .ok_or(ColorParseError::UnknownName)
    }
}

fn parse_hex(hex: &str) -> Result<Color, ColorParseError> {
    if !hex.is_ascii() {
        return Err(ColorParseError::BadHex);
    }
    let nibble = |i: usize| -> Result<u8, ColorParseError> {
        let v = u8::from_str_radix(&hex[i..=i], 16).map_err(|_| ColorParseError::BadHex)?;
        Ok(v * 17)
    };
    let byte = |i: usize| -> Result<u8, ColorParseError> {
        u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| ColorParseError::BadHex)
    };
    match hex.len() {
        3 => Ok(Color::rgb(nibble(0)?, nibble(1)?, nibble(2)?)),
        4 => Ok(Color::rgba(nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?)),
        6 => Ok(Color::rgb(byte(0)?, byte(2)?, byte(4)?)),
        8 => Ok(Color::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
        _ => Err(ColorParseError::BadHex),
    }
}

/// `r, g, b[, a]` with 0-255 color channels and a 0-1 alpha.
fn parse_channels(args: &str) -> Result<Color, ColorParseError> {
    let values = args
        .split(',')
        .map(|v| v.trim().parse::<f32>())
        .collect::<Result<smallvec::SmallVec<[f32; 4]>, _>>()
        .map_err(|_| ColorParseError::BadChannels)?;
    if values.iter().any(|v| !v.is_finite()) {
        return Err(ColorParseError::BadChannels);
    }
    let channel = |v: f32| az::saturating_cast::<f32, u8>(v.round());
    match values.as_slice() {
        [r, g, b] => Ok(Color::rgb(channel(*r), channel(*g), channel(*b))),
        [r, g, b, a] => Ok(Color::rgba(
            channel(*r),
            channel(*g),
            channel(*b),
            channel(a.clamp(0.0, 1.0) * 255.0),
        )),
        _ => Err(ColorParseError::BadChannels),
    }
}

/// The commonly used CSS names.
const NAMED: &[(&str, [u8; 3])] = &[
    ("black", [0, 0, 0]),
    ("white", [255, 255, 255]),
    ("red", [255, 0, 0]),
    ("lime", [0, 255, 0]),
    ("green", [0, 128, 0]),
    ("blue", [0, 0, 255]),
    ("yellow", [255, 255, 0]),
    ("cyan", [0, 255, 255]),
    ("aqua", [0, 255, 255]),
    ("magenta", [255, 0, 255]),
    ("fuchsia", [255, 0, 255]),
    ("gray", [128, 128, 128]),
    ("grey", [128, 128, 128]),
    ("silver", [192, 192, 192]),
    ("maroon", [128, 0, 0]),
    ("olive", [128, 128, 0]),
    ("purple", [128, 0, 128]),
    ("teal", [0, 128, 128]),
    ("navy", [0, 0, 128]),
    ("orange", [255, 165, 0]),
    ("brown", [165, 42, 42]),
    ("pink", [255, 192, 203]),
    ("gold", [255, 215, 0]),
    ("indigo", [75, 0, 130]),
    ("violet", [238, 130, 238]),
    ("crimson", [220, 20, 60]),
    ("coral", [255, 127, 80]),
    ("salmon", [250, 128, 114]),
    ("tomato", [255, 99, 71]),
    ("khaki", [240, 230, 140]),
    ("beige", [245, 245, 220]),
    ("ivory", [255, 255, 240]),
    ("tan", [210, 180, 140]),
    ("chocolate", [210, 105, 30]),
    ("sienna", [160, 82, 45]),
    ("darkblue", [0, 0, 139]),
    ("darkred", [139, 0, 0]),
    ("darkgreen", [0, 100, 0]),
    ("steelblue", [70, 130, 180]),
    ("royalblue", [65, 105, 225]),
    ("skyblue", [135, 206, 235]),
    ("slategray", [112, 128, 144]),
    ("forestgreen", [34, 139, 34]),
    ("seagreen", [46, 139, 87]),
    ("firebrick", [178, 34, 34]),
    ("goldenrod", [218, 165, 32]),
    ("orchid", [218, 112, 214]),
    ("plum", [221, 160, 221]),
    ("turquoise", [64, 224, 208]),
    ("lavender", [230, 230, 250]),
];

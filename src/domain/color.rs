// Signal strength to display color mapping
use serde::{Deserialize, Serialize, Serializer};

/// Lower bound of the displayed signal range in dBm
pub const WEAK_SIGNAL_DBM: f64 = -100.0;
/// Width of the displayed signal range; -30 dBm and above is full strength
pub const SIGNAL_SPAN_DB: f64 = 70.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const STRONG: Color = Color::rgb(0x00, 0xC7, 0x81);
    pub const MEDIUM: Color = Color::rgb(0x33, 0xA1, 0xFD);
    pub const WEAK: Color = Color::rgb(0xFF, 0x49, 0x49);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Convert from HSL with hue in degrees and saturation/lightness in [0, 1]
    pub fn from_hsl(hue: f64, saturation: f64, lightness: f64) -> Self {
        let h = hue.rem_euclid(360.0) / 60.0;
        let c = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
        let x = c * (1.0 - (h % 2.0 - 1.0).abs());
        let m = lightness - c / 2.0;

        let (r, g, b) = match h as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };

        let to_byte = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
        Self::rgb(to_byte(r), to_byte(g), to_byte(b))
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Which ramp the mapper draws colors from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorRamp {
    /// Three bands: strong above 0.7, medium above 0.4, weak otherwise
    #[default]
    Discrete,
    /// `hue = (1 - n) * 240` at full saturation and half lightness
    Continuous,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ColorMapper {
    ramp: ColorRamp,
}

impl ColorMapper {
    pub fn new(ramp: ColorRamp) -> Self {
        Self { ramp }
    }

    pub fn ramp(&self) -> ColorRamp {
        self.ramp
    }

    pub fn color_for(&self, strength: f64) -> Color {
        let n = normalize_strength(strength);
        match self.ramp {
            ColorRamp::Discrete => {
                if n > 0.7 {
                    Color::STRONG
                } else if n > 0.4 {
                    Color::MEDIUM
                } else {
                    Color::WEAK
                }
            }
            ColorRamp::Continuous => Color::from_hsl((1.0 - n) * 240.0, 1.0, 0.5),
        }
    }
}

/// Map dBm into [0, 1]; NaN is treated as the weakest signal.
pub fn normalize_strength(strength: f64) -> f64 {
    let n = (strength - WEAK_SIGNAL_DBM) / SIGNAL_SPAN_DB;
    if n.is_nan() { 0.0 } else { n.clamp(0.0, 1.0) }
}

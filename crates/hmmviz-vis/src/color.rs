//! Hex color parsing and shading.

/// An opaque sRGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Self = Self::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#RGB` or `#RRGGBB`.
    pub fn parse(s: &str) -> Option<Self> {
        let hex = s.strip_prefix('#')?;
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |i: usize, len: usize| u8::from_str_radix(&hex[i..i + len], 16).ok();
        match hex.len() {
            3 => {
                let expand = |v: u8| v * 17;
                Some(Self::new(
                    expand(channel(0, 1)?),
                    expand(channel(1, 1)?),
                    expand(channel(2, 1)?),
                ))
            }
            6 => Some(Self::new(channel(0, 2)?, channel(2, 2)?, channel(4, 2)?)),
            _ => None,
        }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Linear blend toward `other`; `t = 0` is `self`, `t = 1` is `other`.
    pub fn mix(self, other: Rgb, t: f32) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let lerp = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Rgb::new(lerp(self.r, other.r), lerp(self.g, other.g), lerp(self.b, other.b))
    }

    pub fn darken(self, amount: f32) -> Rgb {
        self.mix(Rgb::new(0, 0, 0), amount)
    }
}

/// Darker variant of a hex color, or the input unchanged if it does not parse.
pub fn shade(hex: &str, amount: f32) -> String {
    Rgb::parse(hex).map_or_else(|| hex.to_string(), |c| c.darken(amount).to_hex())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_long_and_short_forms() {
        assert_eq!(Rgb::parse("#2E86AB"), Some(Rgb::new(0x2E, 0x86, 0xAB)));
        assert_eq!(Rgb::parse("#fff"), Some(Rgb::WHITE));
    }

    #[test]
    fn rejects_malformed() {
        assert_eq!(Rgb::parse("2E86AB"), None);
        assert_eq!(Rgb::parse("#2E86A"), None);
        assert_eq!(Rgb::parse("#GG0000"), None);
        assert_eq!(Rgb::parse("#ééé"), None);
    }

    #[test]
    fn hex_round_trips() {
        assert_eq!(Rgb::parse("#A23B72").unwrap().to_hex(), "#A23B72");
    }

    #[test]
    fn darken_moves_toward_black() {
        let c = Rgb::new(200, 100, 50).darken(0.5);
        assert_eq!(c, Rgb::new(100, 50, 25));
        assert_eq!(shade("not-a-color", 0.5), "not-a-color");
    }
}

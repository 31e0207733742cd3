use std::fmt;

/// An 8-bit RGBA color parsed from a CSS color string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::rgb(0, 0, 0);
    pub const WHITE: Rgba = Rgba::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Rgba { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Rgba { r, g, b, a }
    }

    /// Parses `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb()`, `rgba()`, `hsl()`, `hsla()`
    /// and a handful of named colors.
    pub fn parse(input: &str) -> Option<Self> {
        let s = input.trim().to_ascii_lowercase();

        if let Some(hex) = s.strip_prefix('#') {
            return Self::from_hex(hex);
        }

        if let Some((name, args)) = split_function(&s) {
            let args: Vec<&str> = args
                .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
                .filter(|a| !a.is_empty())
                .collect();

            return match (name, args.len()) {
                ("rgb" | "rgba", 3 | 4) => {
                    let r = parse_channel(args[0])?;
                    let g = parse_channel(args[1])?;
                    let b = parse_channel(args[2])?;
                    let a = args.get(3).map_or(Some(255), |a| parse_alpha(a))?;
                    Some(Rgba::rgba(r, g, b, a))
                }
                ("hsl" | "hsla", 3 | 4) => {
                    let h = args[0].trim_end_matches("deg").parse::<f32>().ok()?;
                    let sat = parse_percent(args[1])?;
                    let light = parse_percent(args[2])?;
                    let a = args.get(3).map_or(Some(255), |a| parse_alpha(a))?;
                    let (r, g, b) = hsl_to_rgb(h, sat, light);
                    Some(Rgba::rgba(r, g, b, a))
                }
                _ => None,
            };
        }

        named(&s)
    }

    fn from_hex(hex: &str) -> Option<Self> {
        let digit = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
        let pair = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

        if !hex.is_ascii() {
            return None;
        }

        match hex.len() {
            3 => Some(Rgba::rgb(digit(0)?, digit(1)?, digit(2)?)),
            4 => Some(Rgba::rgba(digit(0)?, digit(1)?, digit(2)?, digit(3)?)),
            6 => Some(Rgba::rgb(pair(0)?, pair(2)?, pair(4)?)),
            8 => Some(Rgba::rgba(pair(0)?, pair(2)?, pair(4)?, pair(6)?)),
            _ => None,
        }
    }

    /// Opaque color from hue in degrees and saturation / lightness in `[0, 1]`.
    pub fn from_hsl(hue: f32, saturation: f32, lightness: f32) -> Self {
        let (r, g, b) = hsl_to_rgb(hue, saturation, lightness);
        Rgba::rgb(r, g, b)
    }

    /// Scales the existing alpha by `alpha` in `[0, 1]`.
    pub fn with_alpha(self, alpha: f32) -> Self {
        let a = (self.a as f32 * alpha.clamp(0.0, 1.0)).round() as u8;
        Rgba { a, ..self }
    }

    pub fn alpha_f32(&self) -> f32 {
        self.a as f32 / 255.0
    }

    pub fn lerp(&self, target: &Rgba, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |from: u8, to: u8| (from as f32 + (to as f32 - from as f32) * t).round() as u8;
        Rgba {
            r: mix(self.r, target.r),
            g: mix(self.g, target.g),
            b: mix(self.b, target.b),
            a: mix(self.a, target.a),
        }
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "rgb({}, {}, {})", self.r, self.g, self.b)
        } else {
            write!(
                f,
                "rgba({}, {}, {}, {:.3})",
                self.r,
                self.g,
                self.b,
                self.alpha_f32()
            )
        }
    }
}

fn split_function(s: &str) -> Option<(&str, &str)> {
    let open = s.find('(')?;
    let args = s[open + 1..].strip_suffix(')')?;
    Some((s[..open].trim(), args))
}

fn parse_channel(arg: &str) -> Option<u8> {
    if let Some(pct) = arg.strip_suffix('%') {
        let v = pct.parse::<f32>().ok()?;
        return Some((v.clamp(0.0, 100.0) * 2.55).round() as u8);
    }
    let v = arg.parse::<f32>().ok()?;
    Some(v.clamp(0.0, 255.0).round() as u8)
}

fn parse_alpha(arg: &str) -> Option<u8> {
    let v = match arg.strip_suffix('%') {
        Some(pct) => pct.parse::<f32>().ok()? / 100.0,
        None => arg.parse::<f32>().ok()?,
    };
    Some((v.clamp(0.0, 1.0) * 255.0).round() as u8)
}

fn parse_percent(arg: &str) -> Option<f32> {
    let v = arg.strip_suffix('%').unwrap_or(arg).parse::<f32>().ok()?;
    Some((v / 100.0).clamp(0.0, 1.0))
}

fn hsl_to_rgb(hue: f32, saturation: f32, lightness: f32) -> (u8, u8, u8) {
    let h = hue.rem_euclid(360.0) / 360.0;
    let s = saturation.clamp(0.0, 1.0);
    let l = lightness.clamp(0.0, 1.0);

    if s == 0.0 {
        let v = (l * 255.0).round() as u8;
        return (v, v, v);
    }

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;

    let channel = |t: f32| {
        let t = t.rem_euclid(1.0);
        let v = if t < 1.0 / 6.0 {
            p + (q - p) * 6.0 * t
        } else if t < 0.5 {
            q
        } else if t < 2.0 / 3.0 {
            p + (q - p) * (2.0 / 3.0 - t) * 6.0
        } else {
            p
        };
        (v * 255.0).round() as u8
    };

    (channel(h + 1.0 / 3.0), channel(h), channel(h - 1.0 / 3.0))
}

fn named(name: &str) -> Option<Rgba> {
    let color = match name {
        "transparent" => Rgba::rgba(0, 0, 0, 0),
        "black" => Rgba::rgb(0, 0, 0),
        "white" => Rgba::rgb(255, 255, 255),
        "red" => Rgba::rgb(255, 0, 0),
        "lime" => Rgba::rgb(0, 255, 0),
        "green" => Rgba::rgb(0, 128, 0),
        "blue" => Rgba::rgb(0, 0, 255),
        "yellow" => Rgba::rgb(255, 255, 0),
        "cyan" | "aqua" => Rgba::rgb(0, 255, 255),
        "magenta" | "fuchsia" => Rgba::rgb(255, 0, 255),
        "orange" => Rgba::rgb(255, 165, 0),
        "purple" => Rgba::rgb(128, 0, 128),
        "pink" => Rgba::rgb(255, 192, 203),
        "gray" | "grey" => Rgba::rgb(128, 128, 128),
        "indigo" => Rgba::rgb(75, 0, 130),
        "violet" => Rgba::rgb(238, 130, 238),
        "gold" => Rgba::rgb(255, 215, 0),
        "teal" => Rgba::rgb(0, 128, 128),
        "navy" => Rgba::rgb(0, 0, 128),
        "maroon" => Rgba::rgb(128, 0, 0),
        _ => return None,
    };
    Some(color)
}

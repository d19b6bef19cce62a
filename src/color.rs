//! Color helpers for dominant color analysis

use palette::{FromColor, Hsv, Srgb};

use crate::models::Color;

/// Channel bucket width used to collapse near-identical colors
pub const QUANTIZATION_STEP: u8 = 16;

/// Colors with all channels at or below this value are considered near-black
pub const NEAR_BLACK_MAX: u8 = 16;

/// Colors with all channels at or above this value are considered near-white
pub const NEAR_WHITE_MIN: u8 = 240;

/// Floor each channel of `color` to a multiple of `step`
///
/// # Panics
///
/// Panics if `step` is zero.
pub fn quantize(color: Color, step: u8) -> Color {
    let (r, g, b) = color.into_components();
    Color::new((r / step) * step, (g / step) * step, (b / step) * step)
}

pub fn is_near_black_or_white(color: Color) -> bool {
    let (r, g, b) = color.into_components();

    (r <= NEAR_BLACK_MAX && g <= NEAR_BLACK_MAX && b <= NEAR_BLACK_MAX)
        || (r >= NEAR_WHITE_MIN && g >= NEAR_WHITE_MIN && b >= NEAR_WHITE_MIN)
}

/// Squared euclidean distance between two colors
pub fn distance(a: Color, b: Color) -> u32 {
    let dr = a.red as i32 - b.red as i32;
    let dg = a.green as i32 - b.green as i32;
    let db = a.blue as i32 - b.blue as i32;

    (dr * dr + dg * dg + db * db) as u32
}

/// Human-readable name of the color family `color` belongs to
pub fn color_name(color: Color) -> &'static str {
    let (r, g, b) = color.into_components();

    if r > 200 && g < 80 && b < 80 {
        "light red"
    } else if r > 150 && g < 80 && b < 80 {
        "red"
    } else if r > 100 && r < 180 && g > 60 && g < 120 && b < 80 {
        "brown"
    } else if g > 200 && r > 200 && b < 100 {
        "light yellow"
    } else if g > 200 && r < 100 && b < 100 {
        "light green"
    } else if g > 150 && r < 100 && b < 100 {
        "green"
    } else if g > 100 && b > 100 && r < 100 {
        "teal"
    } else if b > 200 && r < 100 && g < 100 {
        "light blue"
    } else if b > 100 && r < 80 && g < 80 {
        "dark blue"
    } else if b > 200 && r > 200 && g < 100 {
        "pink"
    } else if r < 100 && g > 200 && b > 200 {
        "cyan"
    } else if r > 200 && g > 200 && b > 200 {
        "white"
    } else if r < 60 && g < 60 && b < 60 {
        "black"
    } else if r > 180 && g > 100 && b < 100 {
        "orange"
    } else if r > 180 && g > 100 && b > 100 {
        "peach"
    } else if r > 150 && g < 100 && b > 100 {
        "violet"
    } else {
        "unknown color"
    }
}

/// Hue (degrees) and saturation (percent) of `color`, rounded to the nearest integer
pub fn rgb_to_hs(color: Color) -> (u16, u8) {
    let rgb: Srgb = Srgb::from_components(color.into_components()).into_format();
    let hsv: Hsv = Hsv::from_color(rgb);

    let hue = hsv.hue.into_positive_degrees();
    let saturation = hsv.saturation * 100.0;

    ((hue + 0.5) as u16, (saturation + 0.5) as u8)
}

/// Full-value color for the given hue (degrees) and saturation (percent)
pub fn hs_to_rgb(hue: f32, saturation: f32) -> Color {
    let hsv: Hsv = Hsv::new(hue, (saturation / 100.0).clamp(0.0, 1.0), 1.0);
    let rgb: Srgb<u8> = Srgb::<f32>::from_color(hsv).into_format();

    Color::from_components(rgb.into_components())
}

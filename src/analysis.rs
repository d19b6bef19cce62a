//! Color frequency analysis over downscaled frames

use std::cmp::Reverse;
use std::collections::HashMap;

use crate::{
    color::{is_near_black_or_white, quantize, QUANTIZATION_STEP},
    image::RawImage,
    models::Color,
};

/// A quantized color and the number of pixels that fell in its bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorCount {
    pub color: Color,
    pub count: usize,
}

impl ColorCount {
    /// Share of `total` pixels this bucket represents, in percent
    pub fn percent(&self, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            self.count as f64 / total as f64 * 100.0
        }
    }
}

/// Pixel counts per quantized color for a single frame
#[derive(Debug, Default, Clone)]
pub struct Histogram {
    counts: HashMap<(u8, u8, u8), usize>,
}

impl Histogram {
    /// Count every pixel of `image` whose quantized color passes `filter`
    pub fn build(image: &RawImage, filter: impl Fn(Color) -> bool) -> Self {
        let mut counts = HashMap::new();

        for color in image.colors() {
            let color = quantize(color, QUANTIZATION_STEP);
            if filter(color) {
                *counts.entry(color.into_components()).or_insert(0) += 1;
            }
        }

        Self { counts }
    }

    pub fn unfiltered(image: &RawImage) -> Self {
        Self::build(image, |_| true)
    }

    pub fn without_black_and_white(image: &RawImage) -> Self {
        Self::build(image, |color| !is_near_black_or_white(color))
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Number of distinct buckets
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Number of counted pixels
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Most frequent bucket, ties going to the lowest color
    pub fn most_frequent(&self) -> Option<ColorCount> {
        self.counts
            .iter()
            .max_by_key(|&(&key, &count)| (count, Reverse(key)))
            .map(|(&key, &count)| ColorCount {
                color: Color::from_components(key),
                count,
            })
    }

    /// All buckets, most frequent first
    pub fn ranked(&self) -> Vec<ColorCount> {
        let mut entries: Vec<_> = self.counts.iter().map(|(&key, &count)| (key, count)).collect();
        entries.sort_unstable_by_key(|&(key, count)| (Reverse(count), key));

        entries
            .into_iter()
            .map(|(key, count)| ColorCount {
                color: Color::from_components(key),
                count,
            })
            .collect()
    }
}

/// Most frequent quantized color of `image`, ignoring near-black and near-white pixels unless
/// nothing else is left
pub fn dominant_color(image: &RawImage) -> Color {
    let mut histogram = Histogram::without_black_and_white(image);

    if histogram.is_empty() {
        histogram = Histogram::unfiltered(image);
    }

    // Only reachable with an empty image, which RawImage rules out
    histogram
        .most_frequent()
        .map(|entry| entry.color)
        .unwrap_or_default()
}

/// The `n` most frequent quantized colors of `image`, black and white included
pub fn top_colors(image: &RawImage, n: usize) -> Vec<ColorCount> {
    let mut ranked = Histogram::unfiltered(image).ranked();
    ranked.truncate(n);
    ranked
}

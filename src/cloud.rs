//! Word cloud layout and encoding.
//!
//! The renderer does its own word counting, separate from the report, and
//! lays the words out along an Archimedean spiral from the canvas centre,
//! biggest first. Collisions are checked against a coarse occupancy grid.

use anyhow::{Context, Result};
use fontdue::{Font, FontSettings};
use image::{ImageFormat, Rgb, RgbImage};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::f32::consts::TAU;
use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::rc::Rc;
use std::time::Instant;
use tracing::{debug, info};

use crate::stopwords::StopWords;

/// Approximate advance of one character, relative to the font size, when no
/// font file is available.
const BLOCK_CHAR_WIDTH: f32 = 0.6;
const GRID_CELL: f32 = 4.0;
const SPIRAL_SPACING: f32 = 8.0;
const SPIRAL_STEP: f32 = 4.0;
const WORD_MARGIN: f32 = 2.0;

#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub background: [u8; 3],
    pub min_font_size: f32,
    /// Defaults to a quarter of the canvas height.
    pub max_font_size: Option<f32>,
    pub max_words: usize,
    /// How much word size follows frequency, between 0 and 1.
    pub relative_scaling: f32,
    /// Factor applied to the font size each time a word does not fit.
    pub font_step: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 800,
            background: [0, 0, 0],
            min_font_size: 10.0,
            max_font_size: None,
            max_words: 200,
            relative_scaling: 0.5,
            font_step: 0.9,
        }
    }
}

pub trait CloudRenderer {
    fn render(&self, text: &str, stop_words: &StopWords) -> Result<WordCloud>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedWord {
    pub word: String,
    pub count: usize,
    pub font_size: f32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub color: [u8; 3],
}

impl PlacedWord {
    fn overlaps(&self, other: &PlacedWord) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

pub struct WordCloud {
    pub width: u32,
    pub height: u32,
    pub background: [u8; 3],
    pub words: Vec<PlacedWord>,
    font: Option<Rc<Font>>,
}

impl WordCloud {
    pub fn has_overlaps(&self) -> bool {
        self.words.iter().enumerate().any(|(i, a)| {
            self.words[i + 1..].iter().any(|b| a.overlaps(b))
        })
    }

    pub fn to_image(&self) -> RgbImage {
        let mut image = RgbImage::from_pixel(self.width, self.height, Rgb(self.background));
        for word in &self.words {
            match &self.font {
                Some(font) => draw_glyphs(&mut image, font, word),
                None => draw_block(&mut image, word),
            }
        }
        image
    }

    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.to_image()
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .context("Failed to encode wordcloud as PNG")?;
        Ok(bytes)
    }

    pub fn to_svg(&self) -> String {
        let [r, g, b] = self.background;
        let mut svg = format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{}\" height=\"{}\">\n\
             <rect width=\"100%\" height=\"100%\" style=\"fill:rgb({},{},{})\"/>\n",
            self.width, self.height, r, g, b
        );
        for word in &self.words {
            let [r, g, b] = word.color;
            let baseline = word.y + ascent(self.font.as_deref(), word.font_size);
            svg.push_str(&format!(
                r#"<text transform="translate({:.1},{:.1})" font-size="{:.0}" font-family="sans-serif" textLength="{:.1}" lengthAdjust="spacingAndGlyphs" style="fill:rgb({},{},{})">{}</text>"#,
                word.x,
                baseline,
                word.font_size,
                word.width,
                r,
                g,
                b,
                escape_xml(&word.word)
            ));
            svg.push('\n');
        }
        svg.push_str("</svg>\n");
        svg
    }
}

pub struct SpiralRenderer {
    config: RenderConfig,
    font: Option<Rc<Font>>,
    word_pattern: Regex,
}

impl SpiralRenderer {
    pub fn new(config: RenderConfig) -> Result<Self> {
        Ok(Self {
            config,
            font: None,
            word_pattern: Regex::new(r"\w[\w']*")?,
        })
    }

    pub fn with_font_file(config: RenderConfig, path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("Failed to read font file {:?}", path))?;
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|e| anyhow::anyhow!("Failed to parse font file {:?}: {}", path, e))?;
        info!(action = "loaded", component = "cloud_font", file_path = ?path, "Loaded font for wordcloud");

        let mut renderer = Self::new(config)?;
        renderer.font = Some(Rc::new(font));
        Ok(renderer)
    }

    /// Words the cloud will show, most frequent first.
    pub fn word_frequencies(&self, text: &str, stop_words: &StopWords) -> Vec<(String, usize)> {
        let ignored: HashSet<String> = stop_words.iter().map(str::to_lowercase).collect();
        let mut counts: HashMap<String, usize> = HashMap::new();

        for found in self.word_pattern.find_iter(text) {
            let mut word = found.as_str();
            if ignored.contains(&word.to_lowercase()) {
                continue;
            }
            if word.to_lowercase().ends_with("'s") {
                word = &word[..word.len() - 2];
            }
            if word.is_empty() || word.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            *counts.entry(word.to_string()).or_insert(0) += 1;
        }

        let mut sorted: Vec<(String, usize)> = counts.into_iter().collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        sorted.truncate(self.config.max_words);
        sorted
    }

    fn measure(&self, word: &str, size: f32) -> (f32, f32) {
        match &self.font {
            Some(font) => {
                let width: f32 = word
                    .chars()
                    .map(|c| font.metrics(c, size).advance_width)
                    .sum();
                let height = font
                    .horizontal_line_metrics(size)
                    .map(|m| m.ascent - m.descent)
                    .unwrap_or(size);
                (width.ceil(), height.ceil())
            }
            None => (
                (word.chars().count() as f32 * BLOCK_CHAR_WIDTH * size).ceil(),
                size.ceil(),
            ),
        }
    }

    fn find_position(&self, grid: &Occupancy, width: f32, height: f32) -> Option<(f32, f32)> {
        let canvas_w = self.config.width as f32;
        let canvas_h = self.config.height as f32;
        if width > canvas_w || height > canvas_h {
            return None;
        }

        let (cx, cy) = (canvas_w / 2.0, canvas_h / 2.0);
        let max_radius = canvas_w.hypot(canvas_h) / 2.0;
        let mut theta = 0.0f32;

        loop {
            let radius = SPIRAL_SPACING * theta / TAU;
            if radius > max_radius {
                return None;
            }
            let x = (cx + radius * theta.cos() - width / 2.0).round();
            let y = (cy + radius * theta.sin() - height / 2.0).round();
            if x >= 0.0
                && y >= 0.0
                && x + width <= canvas_w
                && y + height <= canvas_h
                && grid.is_free(x, y, width, height)
            {
                return Some((x, y));
            }
            theta += SPIRAL_STEP / radius.max(SPIRAL_STEP);
        }
    }
}

impl CloudRenderer for SpiralRenderer {
    fn render(&self, text: &str, stop_words: &StopWords) -> Result<WordCloud> {
        let start_time = Instant::now();
        let frequencies = self.word_frequencies(text, stop_words);
        if frequencies.is_empty() {
            anyhow::bail!("We need at least 1 word to plot a word cloud, got 0");
        }

        let config = &self.config;
        let mut grid = Occupancy::new(config.width, config.height);
        let mut words = Vec::new();
        let mut font_size = config
            .max_font_size
            .unwrap_or(config.height as f32 / 4.0);
        let mut last_count = frequencies[0].1;

        'words: for (index, (word, count)) in frequencies.iter().enumerate() {
            let rs = config.relative_scaling;
            font_size *= rs * (*count as f32 / last_count as f32) + (1.0 - rs);

            let (x, y, width, height) = loop {
                if font_size < config.min_font_size {
                    debug!(word = %word, "Ran out of space for remaining words");
                    break 'words;
                }
                let (width, height) = self.measure(word, font_size);
                if let Some((x, y)) = self.find_position(&grid, width, height) {
                    break (x, y, width, height);
                }
                font_size *= config.font_step;
            };

            grid.mark(x, y, width, height);
            last_count = *count;
            words.push(PlacedWord {
                word: word.clone(),
                count: *count,
                font_size,
                x,
                y,
                width,
                height,
                color: palette_color(index),
            });
        }

        info!(
            action = "complete",
            component = "cloud_layout",
            candidate_words = frequencies.len(),
            placed_words = words.len(),
            duration_ms = start_time.elapsed().as_millis(),
            "Laid out wordcloud"
        );

        Ok(WordCloud {
            width: config.width,
            height: config.height,
            background: config.background,
            words,
            font: self.font.clone(),
        })
    }
}

/// Coarse occupancy bitmap with a summed-area table for O(1) rectangle checks.
struct Occupancy {
    cols: usize,
    rows: usize,
    filled: Vec<bool>,
    sums: Vec<u32>,
}

impl Occupancy {
    fn new(width: u32, height: u32) -> Self {
        let cols = (width as f32 / GRID_CELL).ceil() as usize;
        let rows = (height as f32 / GRID_CELL).ceil() as usize;
        Self {
            cols,
            rows,
            filled: vec![false; cols * rows],
            sums: vec![0; (cols + 1) * (rows + 1)],
        }
    }

    fn span(start: f32, len: f32, limit: usize) -> (usize, usize) {
        let first = (start.max(0.0) / GRID_CELL).floor() as usize;
        let last = ((start + len).max(0.0) / GRID_CELL).ceil() as usize;
        (first.min(limit), last.min(limit))
    }

    fn is_free(&self, x: f32, y: f32, width: f32, height: f32) -> bool {
        let (c0, c1) = Self::span(x, width, self.cols);
        let (r0, r1) = Self::span(y, height, self.rows);
        let stride = self.cols + 1;
        let at = |r: usize, c: usize| self.sums[r * stride + c];
        (at(r1, c1) + at(r0, c0)) - (at(r0, c1) + at(r1, c0)) == 0
    }

    fn mark(&mut self, x: f32, y: f32, width: f32, height: f32) {
        let (c0, c1) = Self::span(x - WORD_MARGIN, width + 2.0 * WORD_MARGIN, self.cols);
        let (r0, r1) = Self::span(y - WORD_MARGIN, height + 2.0 * WORD_MARGIN, self.rows);
        for r in r0..r1 {
            for c in c0..c1 {
                self.filled[r * self.cols + c] = true;
            }
        }

        let stride = self.cols + 1;
        for r in 0..self.rows {
            let mut row_sum = 0;
            for c in 0..self.cols {
                row_sum += u32::from(self.filled[r * self.cols + c]);
                self.sums[(r + 1) * stride + c + 1] = self.sums[r * stride + c + 1] + row_sum;
            }
        }
    }
}

fn ascent(font: Option<&Font>, size: f32) -> f32 {
    font.and_then(|f| f.horizontal_line_metrics(size))
        .map(|m| m.ascent)
        .unwrap_or(size * 0.8)
}

fn draw_block(image: &mut RgbImage, word: &PlacedWord) {
    // Inset so neighbouring blocks stay visually apart
    let x0 = word.x as u32 + 1;
    let y0 = word.y as u32 + 1;
    let x1 = ((word.x + word.width) as u32).saturating_sub(1).min(image.width());
    let y1 = ((word.y + word.height) as u32).saturating_sub(1).min(image.height());
    for y in y0..y1 {
        for x in x0..x1 {
            image.put_pixel(x, y, Rgb(word.color));
        }
    }
}

fn draw_glyphs(image: &mut RgbImage, font: &Font, word: &PlacedWord) {
    let baseline = word.y + ascent(Some(font), word.font_size);
    let mut pen_x = word.x;

    for c in word.word.chars() {
        let (metrics, coverage) = font.rasterize(c, word.font_size);
        let left = pen_x.round() as i64 + i64::from(metrics.xmin);
        let top = baseline.round() as i64 - metrics.height as i64 - i64::from(metrics.ymin);

        for (row, line) in coverage.chunks(metrics.width.max(1)).enumerate() {
            for (col, alpha) in line.iter().enumerate() {
                let px = left + col as i64;
                let py = top + row as i64;
                if *alpha == 0
                    || px < 0
                    || py < 0
                    || px >= i64::from(image.width())
                    || py >= i64::from(image.height())
                {
                    continue;
                }
                let pixel = image.get_pixel_mut(px as u32, py as u32);
                let a = f32::from(*alpha) / 255.0;
                for (channel, target) in pixel.0.iter_mut().zip(word.color) {
                    *channel = (f32::from(*channel) * (1.0 - a) + f32::from(target) * a).round() as u8;
                }
            }
        }
        pen_x += metrics.advance_width;
    }
}

/// Spreads hues by the golden angle so adjacent ranks get distinct colours.
fn palette_color(index: usize) -> [u8; 3] {
    let hue = (index as f32 * 137.508) % 360.0;
    hsl_to_rgb(hue, 0.8, 0.55)
}

fn hsl_to_rgb(hue: f32, saturation: f32, lightness: f32) -> [u8; 3] {
    let chroma = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let sector = hue / 60.0;
    let second = chroma * (1.0 - (sector % 2.0 - 1.0).abs());
    let (r, g, b) = match sector as u32 {
        0 => (chroma, second, 0.0),
        1 => (second, chroma, 0.0),
        2 => (0.0, chroma, second),
        3 => (0.0, second, chroma),
        4 => (second, 0.0, chroma),
        _ => (chroma, 0.0, second),
    };
    let m = lightness - chroma / 2.0;
    let to_byte = |v: f32| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    [to_byte(r), to_byte(g), to_byte(b)]
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

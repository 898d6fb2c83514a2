//! Menu painter
//!
//! The session only depends on the [`Renderer`] trait: given a mapped pixel
//! buffer and the menu state, fill the buffer with ARGB8888 pixels. The
//! bundled [`SoftwareRenderer`] paints with tiny-skia and an 8x8 bitmap
//! glyph set scaled to the requested point size.

use font8x8::{UnicodeFonts, BASIC_FONTS};
use log::warn;
use tiny_skia::{FillRule, Paint, PathBuilder, PixmapMut, Rect, Transform};

use crate::config::{Color, ColorScheme};

/// Side length of a glyph cell before scaling
const GLYPH_CELL: u32 = 8;

/// Extra pixels between lines on top of the glyph height
const LINE_SPACING: u32 = 7;

const DEFAULT_POINT_SIZE: f32 = 10.0;

/// Parsed "family size" descriptor such as `"monospace 10"`
#[derive(Debug, Clone, PartialEq)]
pub struct FontDescriptor {
    pub family: String,
    pub size: f32,
}

impl FontDescriptor {
    pub fn parse(descriptor: &str) -> Self {
        let descriptor = descriptor.trim();
        let (family, size) = match descriptor.rsplit_once(char::is_whitespace) {
            Some((family, size)) => match size.parse::<f32>() {
                Ok(size) if size.is_finite() && size > 0.0 => (family.trim(), size),
                _ => (descriptor, DEFAULT_POINT_SIZE),
            },
            None => match descriptor.parse::<f32>() {
                Ok(size) if size.is_finite() && size > 0.0 => ("", size),
                _ => (descriptor, DEFAULT_POINT_SIZE),
            },
        };

        let family = if family.is_empty() { "monospace" } else { family };
        Self {
            family: family.to_string(),
            size,
        }
    }

    /// Integer glyph scale for this point size at 96 dpi
    pub fn scale(&self) -> u32 {
        let pixels = self.size * 96.0 / 72.0;
        ((pixels / GLYPH_CELL as f32).round() as u32).max(1)
    }
}

/// Pixel metrics used for layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontMetrics {
    pub scale: u32,
    pub advance: u32,
    pub font_height: u32,
    pub line_height: u32,
}

impl FontMetrics {
    pub fn for_font(font: &FontDescriptor) -> Self {
        let scale = font.scale();
        let font_height = GLYPH_CELL * scale;
        Self {
            scale,
            advance: GLYPH_CELL * scale,
            font_height,
            line_height: font_height + LINE_SPACING,
        }
    }

    pub fn text_width(&self, text: &str) -> u32 {
        self.advance.saturating_mul(text.chars().count() as u32)
    }

    /// Size of a menu showing every item on its own line
    pub fn menu_size(&self, items: &[String]) -> (u32, u32) {
        let widest = items.iter().map(|item| self.text_width(item)).max().unwrap_or(0);
        let height = self.line_height.saturating_mul(items.len() as u32);
        (widest.max(self.advance), height.max(self.line_height))
    }
}

/// Everything a painter needs for one frame
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub items: &'a [String],
    pub selected: usize,
    pub colors: &'a ColorScheme,
    pub font: &'a FontDescriptor,
}

pub trait Renderer {
    fn metrics(&self) -> FontMetrics;

    /// Paint `frame` into `pixels` (row-major ARGB8888, `frame.stride` bytes per row)
    fn render(&self, pixels: &mut [u8], frame: &Frame<'_>);
}

/// CPU painter built on tiny-skia
#[derive(Debug, Clone)]
pub struct SoftwareRenderer {
    metrics: FontMetrics,
}

impl SoftwareRenderer {
    pub fn new(font: &FontDescriptor) -> Self {
        Self {
            metrics: FontMetrics::for_font(font),
        }
    }

    fn text_path(&self, text: &str, x: u32, y: u32) -> Option<tiny_skia::Path> {
        let scale = self.metrics.scale as f32;
        let mut builder = PathBuilder::new();
        for (column, ch) in text.chars().enumerate() {
            let glyph = BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?'))?;
            let origin_x = x as f32 + (column as u32 * self.metrics.advance) as f32;
            for (row, bits) in glyph.iter().enumerate() {
                for bit in 0..GLYPH_CELL {
                    if bits & (1 << bit) == 0 {
                        continue;
                    }
                    let rect = Rect::from_xywh(
                        origin_x + bit as f32 * scale,
                        y as f32 + row as f32 * scale,
                        scale,
                        scale,
                    );
                    if let Some(rect) = rect {
                        builder.push_rect(rect);
                    }
                }
            }
        }
        builder.finish()
    }
}

impl Renderer for SoftwareRenderer {
    fn metrics(&self) -> FontMetrics {
        self.metrics
    }

    fn render(&self, pixels: &mut [u8], frame: &Frame<'_>) {
        if frame.stride != frame.width * 4 {
            warn!(
                "Unsupported stride {} for width {}, frame left blank",
                frame.stride, frame.width
            );
            return;
        }
        let Some(mut pixmap) = PixmapMut::from_bytes(pixels, frame.width, frame.height) else {
            warn!(
                "Buffer does not hold a {}x{} frame, frame left blank",
                frame.width, frame.height
            );
            return;
        };

        pixmap.fill(skia_color(frame.colors.normal_bg));

        let metrics = self.metrics;
        let text_offset = (metrics.line_height - metrics.font_height) / 2;
        for (index, item) in frame.items.iter().enumerate() {
            let top = index as u32 * metrics.line_height;
            if top >= frame.height {
                break;
            }

            let selected = index == frame.selected;
            if selected {
                if let Some(row) =
                    Rect::from_xywh(0.0, top as f32, frame.width as f32, metrics.line_height as f32)
                {
                    pixmap.fill_rect(row, &solid(frame.colors.select_bg), Transform::identity(), None);
                }
            }

            let fg = if selected {
                frame.colors.select_fg
            } else {
                frame.colors.normal_fg
            };
            if let Some(path) = self.text_path(item, 0, top + text_offset) {
                pixmap.fill_path(&path, &solid(fg), FillRule::Winding, Transform::identity(), None);
            }
        }

        // tiny-skia writes RGBA; wl_shm ARGB8888 is little-endian BGRA in memory
        for pixel in pixels.chunks_exact_mut(4) {
            pixel.swap(0, 2);
        }
    }
}

fn skia_color(color: Color) -> tiny_skia::Color {
    let (r, g, b, a) = color.rgba();
    tiny_skia::Color::from_rgba8(r, g, b, a)
}

fn solid(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(skia_color(color));
    paint.anti_alias = false;
    paint
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_font_descriptor_parsing() {
        let font = FontDescriptor::parse("monospace 10");
        assert_eq!(font.family, "monospace");
        assert_eq!(font.size, 10.0);

        let font = FontDescriptor::parse("DejaVu Sans Mono 12.5");
        assert_eq!(font.family, "DejaVu Sans Mono");
        assert_eq!(font.size, 12.5);
    }

    #[test]
    fn test_font_descriptor_without_size_uses_default() {
        let font = FontDescriptor::parse("Iosevka");
        assert_eq!(font.family, "Iosevka");
        assert_eq!(font.size, DEFAULT_POINT_SIZE);

        let font = FontDescriptor::parse("Iosevka -3");
        assert_eq!(font.family, "Iosevka -3");
        assert_eq!(font.size, DEFAULT_POINT_SIZE);
    }

    #[test]
    fn test_scale_never_drops_below_one() {
        assert_eq!(FontDescriptor::parse("mono 1").scale(), 1);
        assert_eq!(FontDescriptor::parse("mono 10").scale(), 2);
        assert_eq!(FontDescriptor::parse("mono 24").scale(), 4);
    }

    #[test]
    fn test_menu_size_uses_widest_item() {
        let metrics = FontMetrics::for_font(&FontDescriptor::parse("mono 10"));
        let items = vec!["ab".to_string(), "abcd".to_string(), "".to_string()];
        let (width, height) = metrics.menu_size(&items);
        assert_eq!(width, 4 * metrics.advance);
        assert_eq!(height, 3 * metrics.line_height);
        assert_eq!(metrics.line_height, metrics.font_height + LINE_SPACING);
    }

    #[test]
    fn test_menu_size_of_blank_items_is_not_zero() {
        let metrics = FontMetrics::for_font(&FontDescriptor::parse("mono 10"));
        let (width, height) = metrics.menu_size(&[String::new()]);
        assert!(width > 0);
        assert!(height > 0);
    }

    #[test]
    fn test_render_rejects_mismatched_buffers() {
        let font = FontDescriptor::parse("mono 8");
        let renderer = SoftwareRenderer::new(&font);
        let colors = ColorScheme::default();
        let items = vec!["x".to_string()];
        let mut pixels = vec![0xaa; 16];
        let frame = Frame {
            width: 8,
            height: 8,
            stride: 32,
            items: &items,
            selected: 0,
            colors: &colors,
            font: &font,
        };
        renderer.render(&mut pixels, &frame);
        assert!(pixels.iter().all(|b| *b == 0xaa));
    }
}

//! # Face Layout and Rendering
//!
//! Draws the single fixed-layout screen:
//!
//! ```text
//!            12:34:56            ← time, centred
//!        SUN, OCT 18 2026        ← date, centred
//!             ──────             ← separator (weather only)
//!        [☂]  75°  54°           ← icon (interactive only), high, low
//! ```
//!
//! Layout is a pure function ([`compute_layout`]) of the face metrics, the
//! power mode, the clock reading, the weather snapshot and the screen bounds.
//! Every horizontal offset comes from measured text widths, so empty or odd
//! strings degrade gracefully. Round panels are handled by loading different
//! [`FaceMetrics`] at insets time, never by branching here.

use crate::config::{FontChoice, LayoutConfig};
use crate::framebuffer::BitMask;
use crate::power::{DisplayPalette, TextPaint};
use crate::{ClockReading, WeatherSnapshot};
use embedded_graphics::{
    mono_font::{MonoFont, MonoTextStyle},
    pixelcolor::{BinaryColor, Rgb888},
    prelude::*,
    primitives::{Line, PrimitiveStyle, Rectangle},
    text::{renderer::TextRenderer, Baseline, Text},
};

/// Per-shape layout constants, reloaded when the host reports insets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaceMetrics {
    pub time_font: FontChoice,
    pub date_font: FontChoice,
    pub temperature_font: FontChoice,
    pub time_y: i32,
    pub date_y: i32,
    pub weather_y: i32,
    pub gap: i32,
    pub icon_size: u32,
}

impl FaceMetrics {
    pub fn from_layout(layout: &LayoutConfig) -> Self {
        Self {
            time_font: layout.time_font,
            date_font: layout.date_font,
            temperature_font: layout.temperature_font,
            time_y: layout.time_y_offset,
            date_y: layout.date_y_offset,
            weather_y: layout.weather_y_offset,
            // Negative gaps would fold the weather row onto itself.
            gap: layout.temperature_gap.max(0),
            icon_size: layout.icon_size,
        }
    }

    /// Half the separator length.
    pub fn separator_half_length(&self) -> i32 {
        4 * self.gap
    }
}

/// A run of text positioned by its left end on the baseline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextPlacement {
    pub text: String,
    pub origin: Point,
    pub width: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WeatherLayout {
    pub separator: (Point, Point),
    /// Top-left corner of the condition icon; `None` in ambient mode
    pub icon: Option<Point>,
    pub high: TextPlacement,
    pub low: TextPlacement,
}

/// Positions of everything on one frame. Computed per draw, never stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayoutMetrics {
    pub time: TextPlacement,
    pub date: TextPlacement,
    pub weather: Option<WeatherLayout>,
}

/// Everything that varies frame to frame.
#[derive(Clone, Copy, Debug)]
pub struct FrameInputs<'a> {
    pub ambient: bool,
    pub twelve_hour: bool,
    pub reading: &'a ClockReading,
    pub weather: Option<&'a WeatherSnapshot>,
}

fn style(font: &'static MonoFont<'static>) -> MonoTextStyle<'static, BinaryColor> {
    MonoTextStyle::new(font, BinaryColor::On)
}

/// Advance width of `text` in `font`; zero for an empty string.
pub fn text_width(font: FontChoice, text: &str) -> u32 {
    if text.is_empty() {
        return 0;
    }
    style(font.font())
        .measure_string(text, Point::zero(), Baseline::Alphabetic)
        .bounding_box
        .size
        .width
}

/// Rasterizes `text` with its baseline-left at `origin`. Returns the mask and
/// the screen position of the mask's top-left pixel. The mask has one pixel
/// of margin on every side so edge pixels outside the glyph box are
/// reachable.
fn text_mask(font: FontChoice, text: &str, origin: Point) -> (BitMask, Point) {
    let style = style(font.font());
    let bbox = style
        .measure_string(text, origin, Baseline::Alphabetic)
        .bounding_box;
    let margin = Point::new(1, 1);
    let mut mask = BitMask::new(bbox.size + Size::new(2, 2));
    Text::with_baseline(text, origin - bbox.top_left + margin, style, Baseline::Alphabetic)
        .draw(&mut mask)
        .ok();
    (mask, bbox.top_left - margin)
}

/// Height of the inked rows of `text`; zero for an empty string.
pub fn glyph_height(font: FontChoice, text: &str) -> i32 {
    if text.is_empty() {
        return 0;
    }
    let (mask, _) = text_mask(font, text, Point::zero());
    mask.row_span().map_or(0, |(top, bottom)| bottom - top + 1)
}

/// Left offset that centres a run of `width` on `center_x`.
pub fn centered_x(center_x: i32, width: u32) -> i32 {
    center_x - width as i32 / 2
}

fn centered(text: String, font: FontChoice, center_x: i32, baseline: i32) -> TextPlacement {
    let width = text_width(font, &text);
    TextPlacement {
        origin: Point::new(centered_x(center_x, width), baseline),
        text,
        width,
    }
}

pub fn compute_layout(metrics: &FaceMetrics, inputs: &FrameInputs<'_>, bounds: Rectangle) -> LayoutMetrics {
    let center_x = bounds.top_left.x + bounds.size.width as i32 / 2;
    let top = bounds.top_left.y;

    let time = centered(
        inputs.reading.time_text(inputs.ambient, inputs.twelve_hour),
        metrics.time_font,
        center_x,
        top + metrics.time_y,
    );
    let date = centered(
        inputs.reading.date_text(),
        metrics.date_font,
        center_x,
        top + metrics.date_y,
    );

    let weather = inputs.weather.map(|snapshot| {
        let font = metrics.temperature_font;
        let gap = metrics.gap;
        let weather_y = top + metrics.weather_y;
        let high_width = text_width(font, &snapshot.high_temperature);
        let low_width = text_width(font, &snapshot.low_temperature);
        let glyph_h = glyph_height(font, &snapshot.high_temperature);

        let line_y = (top + metrics.date_y + weather_y) / 2 - glyph_h / 2;
        let half = metrics.separator_half_length();
        let separator = (
            Point::new(center_x - half, line_y),
            Point::new(center_x + half, line_y),
        );

        // Ambient centres the pair as one block and drops the icon.
        let (high_x, icon) = if inputs.ambient {
            (centered_x(center_x, high_width + low_width + gap as u32), None)
        } else {
            let high_x = centered_x(center_x, high_width);
            let icon_w = snapshot.icon.width() as i32;
            let icon_h = snapshot.icon.height() as i32;
            let icon = Point::new(
                high_x - icon_w - 2 * gap,
                weather_y - glyph_h / 2 - icon_h / 2,
            );
            (high_x, Some(icon))
        };
        let low_x = high_x + high_width as i32 + gap;

        WeatherLayout {
            separator,
            icon,
            high: TextPlacement {
                text: snapshot.high_temperature.clone(),
                origin: Point::new(high_x, weather_y),
                width: high_width,
            },
            low: TextPlacement {
                text: snapshot.low_temperature.clone(),
                origin: Point::new(low_x, weather_y),
                width: low_width,
            },
        }
    });

    LayoutMetrics { time, date, weather }
}

fn blend(a: Rgb888, b: Rgb888) -> Rgb888 {
    let mix = |x: u8, y: u8| ((x as u16 + y as u16) / 2) as u8;
    Rgb888::new(mix(a.r(), b.r()), mix(a.g(), b.g()), mix(a.b(), b.b()))
}

/// Draws one text run. Smoothed paints soften glyph edges with a half-tone
/// of text and background; unsmoothed paints emit only the text colour.
pub fn draw_text<D>(
    target: &mut D,
    placement: &TextPlacement,
    font: FontChoice,
    paint: TextPaint,
    background: Rgb888,
) where
    D: DrawTarget<Color = Rgb888>,
{
    if placement.text.is_empty() {
        return;
    }
    let (mask, offset) = text_mask(font, &placement.text, placement.origin);
    let edge = blend(paint.color, background);
    let size = mask.size();
    let pixels = (0..size.height as i32)
        .flat_map(|y| (0..size.width as i32).map(move |x| Point::new(x, y)))
        .filter_map(|p| {
            if mask.is_set(p.x, p.y) {
                Some(Pixel(offset + p, paint.color))
            } else if paint.anti_alias && mask.is_edge(p.x, p.y) {
                Some(Pixel(offset + p, edge))
            } else {
                None
            }
        });
    target.draw_iter(pixels).ok();
}

/// Draws a complete frame into `target`.
pub fn draw_face<D>(
    target: &mut D,
    metrics: &FaceMetrics,
    palette: &DisplayPalette,
    inputs: &FrameInputs<'_>,
) -> LayoutMetrics
where
    D: DrawTarget<Color = Rgb888> + OriginDimensions,
{
    let layout = compute_layout(metrics, inputs, target.bounding_box());
    let background = palette.background;

    target.clear(background).ok();
    draw_text(target, &layout.time, metrics.time_font, palette.time, background);
    draw_text(target, &layout.date, metrics.date_font, palette.date, background);

    if let (Some(weather), Some(snapshot)) = (&layout.weather, inputs.weather) {
        Line::new(weather.separator.0, weather.separator.1)
            .into_styled(PrimitiveStyle::with_stroke(palette.line, 1))
            .draw(target)
            .ok();
        if let Some(origin) = weather.icon {
            target.draw_iter(snapshot.icon.pixels(origin, palette.icon)).ok();
        }
        let font = metrics.temperature_font;
        draw_text(target, &weather.high, font, palette.high_temperature, background);
        draw_text(target, &weather.low, font, palette.low_temperature, background);
    }

    layout
}

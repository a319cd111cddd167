//! # Weather Condition Icons
//!
//! The phone sends an OpenWeatherMap condition id with every forecast. This
//! module maps those ids onto a small set of icon categories and rasterizes
//! each category into a one-bit [`IconImage`].
//!
//! ## Condition Table
//!
//! | Ids              | Icon          |
//! |------------------|---------------|
//! | 200–232          | Storm         |
//! | 300–321          | LightRain     |
//! | 500–504, 520–531 | Rain          |
//! | 511, 600–622     | Snow          |
//! | 701–761          | Fog           |
//! | 762–781          | Storm         |
//! | 800              | Clear         |
//! | 801              | LightClouds   |
//! | 802–804          | Cloudy        |
//! | anything else    | Unknown       |
//!
//! Unknown ids never fail: they resolve to [`ConditionIcon::Unknown`], which
//! has its own glyph.
//!
//! ## Caching
//! Rasterizing is cheap but not free, and the same condition tends to arrive
//! over and over. [`IconCache`] keeps one image per category for the lifetime
//! of the engine and only throws them away when the icon size changes.

use crate::framebuffer::BitMask;
use embedded_graphics::{
    mono_font::{ascii::FONT_6X10, MonoTextStyle},
    pixelcolor::{BinaryColor, Rgb888},
    prelude::*,
    primitives::{Circle, Line, PrimitiveStyle, Rectangle},
    text::{Alignment, Baseline, Text, TextStyleBuilder},
};
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;

/// Icon category for a weather condition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConditionIcon {
    Clear,
    LightClouds,
    Cloudy,
    LightRain,
    Rain,
    Storm,
    Snow,
    Fog,
    /// Fallback for ids outside the table
    Unknown,
}

impl ConditionIcon {
    pub fn from_condition_code(code: i32) -> Self {
        match code {
            200..=232 => ConditionIcon::Storm,
            300..=321 => ConditionIcon::LightRain,
            500..=504 | 520..=531 => ConditionIcon::Rain,
            511 | 600..=622 => ConditionIcon::Snow,
            701..=761 => ConditionIcon::Fog,
            762..=781 => ConditionIcon::Storm,
            800 => ConditionIcon::Clear,
            801 => ConditionIcon::LightClouds,
            802..=804 => ConditionIcon::Cloudy,
            _ => ConditionIcon::Unknown,
        }
    }
}

/// A square one-bit icon.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IconImage {
    mask: BitMask,
}

impl IconImage {
    pub fn width(&self) -> u32 {
        self.mask.size().width
    }

    pub fn height(&self) -> u32 {
        self.mask.size().height
    }

    pub fn mask(&self) -> &BitMask {
        &self.mask
    }

    /// Coloured pixels with the icon's top-left corner at `origin`.
    pub fn pixels(&self, origin: Point, color: Rgb888) -> impl Iterator<Item = Pixel<Rgb888>> + '_ {
        self.mask
            .set_points()
            .map(move |p| Pixel(origin + p, color))
    }
}

/// Draws `icon` into a fresh `size x size` mask.
pub fn rasterize(icon: ConditionIcon, size: u32) -> IconImage {
    let size = size.max(8);
    let mut mask = BitMask::new(Size::new(size, size));
    let s = size as i32;
    // Fractions of the icon edge, so every category scales with `size`.
    let f = |num: i32, den: i32| s * num / den;
    let stroke = (s / 16).max(1) as u32;
    let on = PrimitiveStyle::with_fill(BinaryColor::On);
    let line = PrimitiveStyle::with_stroke(BinaryColor::On, stroke);

    let sun = |mask: &mut BitMask, center: Point, radius: i32| {
        Circle::with_center(center, (radius * 2) as u32)
            .into_styled(on)
            .draw(mask)
            .ok();
        let ray = radius + radius / 2 + 1;
        let diag = ray * 7 / 10;
        for (dx, dy) in [
            (0, -ray),
            (0, ray),
            (-ray, 0),
            (ray, 0),
            (diag, diag),
            (-diag, diag),
            (diag, -diag),
            (-diag, -diag),
        ] {
            let inner = Point::new(center.x + dx * 3 / 4, center.y + dy * 3 / 4);
            Line::new(inner, Point::new(center.x + dx, center.y + dy))
                .into_styled(line)
                .draw(mask)
                .ok();
        }
    };

    // A cloud occupying the top two thirds of the icon.
    let cloud = |mask: &mut BitMask| {
        Circle::new(Point::new(f(1, 16), f(5, 16)), f(3, 8) as u32)
            .into_styled(on)
            .draw(mask)
            .ok();
        Circle::new(Point::new(f(5, 16), f(2, 16)), f(1, 2) as u32)
            .into_styled(on)
            .draw(mask)
            .ok();
        Circle::new(Point::new(f(9, 16), f(5, 16)), f(3, 8) as u32)
            .into_styled(on)
            .draw(mask)
            .ok();
        Rectangle::new(
            Point::new(f(4, 16), f(7, 16)),
            Size::new(f(8, 16) as u32, f(4, 16) as u32),
        )
        .into_styled(on)
        .draw(mask)
        .ok();
    };

    let drops = |mask: &mut BitMask, columns: &[i32]| {
        for &col in columns {
            let x = f(col, 16);
            Line::new(Point::new(x + f(1, 16), f(12, 16)), Point::new(x, f(15, 16)))
                .into_styled(line)
                .draw(mask)
                .ok();
        }
    };

    match icon {
        ConditionIcon::Clear => sun(&mut mask, Point::new(s / 2, s / 2), f(3, 16)),
        ConditionIcon::LightClouds => {
            sun(&mut mask, Point::new(f(11, 16), f(4, 16)), f(2, 16));
            cloud(&mut mask);
        }
        ConditionIcon::Cloudy => cloud(&mut mask),
        ConditionIcon::LightRain => {
            cloud(&mut mask);
            drops(&mut mask, &[5, 10]);
        }
        ConditionIcon::Rain => {
            cloud(&mut mask);
            drops(&mut mask, &[3, 6, 9, 12]);
        }
        ConditionIcon::Storm => {
            cloud(&mut mask);
            drops(&mut mask, &[3, 12]);
            let bolt = [
                Point::new(f(9, 16), f(11, 16)),
                Point::new(f(7, 16), f(13, 16)),
                Point::new(f(9, 16), f(13, 16)),
                Point::new(f(7, 16), s - 1),
            ];
            for pair in bolt.windows(2) {
                Line::new(pair[0], pair[1])
                    .into_styled(line)
                    .draw(&mut mask)
                    .ok();
            }
        }
        ConditionIcon::Snow => {
            cloud(&mut mask);
            for col in [4, 8, 12] {
                Circle::with_center(Point::new(f(col, 16), f(14, 16)), (stroke * 2).max(2))
                    .into_styled(on)
                    .draw(&mut mask)
                    .ok();
            }
        }
        ConditionIcon::Fog => {
            for row in [4, 7, 10, 13] {
                let indent = if row % 2 == 0 { f(1, 16) } else { f(3, 16) };
                Line::new(Point::new(indent, f(row, 16)), Point::new(s - 1 - indent, f(row, 16)))
                    .into_styled(line)
                    .draw(&mut mask)
                    .ok();
            }
        }
        ConditionIcon::Unknown => {
            Circle::new(Point::new(1, 1), (s - 2) as u32)
                .into_styled(line)
                .draw(&mut mask)
                .ok();
            let centered = TextStyleBuilder::new()
                .alignment(Alignment::Center)
                .baseline(Baseline::Middle)
                .build();
            Text::with_text_style(
                "?",
                Point::new(s / 2, s / 2),
                MonoTextStyle::new(&FONT_6X10, BinaryColor::On),
                centered,
            )
            .draw(&mut mask)
            .ok();
        }
    }

    IconImage { mask }
}

/// One rasterized image per icon category.
#[derive(Debug)]
pub struct IconCache {
    size: u32,
    icons: HashMap<ConditionIcon, Arc<IconImage>>,
    rasterized: usize,
}

impl IconCache {
    pub fn new(size: u32) -> Self {
        Self {
            size,
            icons: HashMap::new(),
            rasterized: 0,
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn get(&mut self, icon: ConditionIcon) -> Arc<IconImage> {
        if let Some(image) = self.icons.get(&icon) {
            return Arc::clone(image);
        }
        debug!("rasterizing {:?} icon at {}px", icon, self.size);
        let image = Arc::new(rasterize(icon, self.size));
        self.rasterized += 1;
        self.icons.insert(icon, Arc::clone(&image));
        image
    }

    /// Switches icon size; cached images of the old size are dropped.
    pub fn resize(&mut self, size: u32) {
        if size != self.size {
            self.size = size;
            self.icons.clear();
        }
    }

    /// How many times an icon has been rasterized.
    pub fn rasterized_count(&self) -> usize {
        self.rasterized
    }
}

//! In-memory pixel buffers.
//!
//! [`FrameBuffer`] is a full-colour surface the engine can draw into when the
//! host has no framebuffer of its own (development mode, tests). [`BitMask`] is
//! a one-bit scratch canvas used to rasterize glyph runs and weather icons
//! before they are coloured.

use embedded_graphics::{
    pixelcolor::{BinaryColor, Rgb888},
    prelude::*,
};

/// Row-major RGB frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    pixels: Vec<Rgb888>,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Rgb888::BLACK; (width * height) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb888> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.pixels[(y * self.width + x) as usize])
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: Rgb888) {
        if x >= self.width || y >= self.height {
            return;
        }
        self.pixels[(y * self.width + x) as usize] = color;
    }

    /// Number of pixels with exactly this colour.
    pub fn count_color(&self, color: Rgb888) -> usize {
        self.pixels.iter().filter(|&&p| p == color).count()
    }

    /// Distinct colours present, as packed `0xRRGGBB` values, sorted.
    pub fn distinct_colors(&self) -> Vec<u32> {
        let mut colors: Vec<u32> = self.pixels.iter().map(|p| p.into_storage()).collect();
        colors.sort_unstable();
        colors.dedup();
        colors
    }

    /// True if every pixel in rows `top..bottom` equals `background`.
    pub fn rows_blank(&self, top: u32, bottom: u32, background: Rgb888) -> bool {
        let bottom = bottom.min(self.height);
        (top..bottom).all(|y| (0..self.width).all(|x| self.pixel(x, y) == Some(background)))
    }

    /// Coarse ASCII preview: each `cell x cell` block becomes one character,
    /// `#` when at least half of it differs from `background`, `.` when any of
    /// it does, blank otherwise.
    pub fn to_ascii(&self, background: Rgb888, cell: u32) -> String {
        let cell = cell.max(1);
        let mut out = String::new();
        for cy in (0..self.height).step_by(cell as usize) {
            for cx in (0..self.width).step_by(cell as usize) {
                let mut total = 0;
                let mut ink = 0;
                for y in cy..(cy + cell).min(self.height) {
                    for x in cx..(cx + cell).min(self.width) {
                        total += 1;
                        if self.pixel(x, y) != Some(background) {
                            ink += 1;
                        }
                    }
                }
                out.push(if ink * 2 >= total && ink > 0 {
                    '#'
                } else if ink > 0 {
                    '.'
                } else {
                    ' '
                });
            }
            out.push('\n');
        }
        out
    }
}

impl DrawTarget for FrameBuffer {
    type Color = Rgb888;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x >= 0 && point.y >= 0 {
                self.set_pixel(point.x as u32, point.y as u32, color);
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.pixels.fill(color);
        Ok(())
    }
}

impl OriginDimensions for FrameBuffer {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// One-bit canvas.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitMask {
    size: Size,
    bits: Vec<bool>,
}

impl BitMask {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            bits: vec![false; (size.width * size.height) as usize],
        }
    }

    pub fn is_set(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x as u32 >= self.size.width || y as u32 >= self.size.height {
            return false;
        }
        self.bits[(y as u32 * self.size.width + x as u32) as usize]
    }

    /// Unset pixel with at least one set 4-neighbour.
    pub fn is_edge(&self, x: i32, y: i32) -> bool {
        !self.is_set(x, y)
            && (self.is_set(x - 1, y)
                || self.is_set(x + 1, y)
                || self.is_set(x, y - 1)
                || self.is_set(x, y + 1))
    }

    pub fn set_count(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    /// First and last rows containing a set pixel.
    pub fn row_span(&self) -> Option<(i32, i32)> {
        let width = self.size.width.max(1) as usize;
        let mut rows = self
            .bits
            .chunks(width)
            .enumerate()
            .filter(|(_, row)| row.iter().any(|&b| b))
            .map(|(y, _)| y as i32);
        let first = rows.next()?;
        Some((first, rows.last().unwrap_or(first)))
    }

    /// Coordinates of every set pixel, row-major.
    pub fn set_points(&self) -> impl Iterator<Item = Point> + '_ {
        let width = self.size.width;
        self.bits
            .iter()
            .enumerate()
            .filter(|(_, &bit)| bit)
            .map(move |(i, _)| Point::new((i as u32 % width) as i32, (i as u32 / width) as i32))
    }
}

impl DrawTarget for BitMask {
    type Color = BinaryColor;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x >= 0
                && point.y >= 0
                && (point.x as u32) < self.size.width
                && (point.y as u32) < self.size.height
            {
                let index = (point.y as u32 * self.size.width + point.x as u32) as usize;
                self.bits[index] = color.is_on();
            }
        }
        Ok(())
    }
}

impl OriginDimensions for BitMask {
    fn size(&self) -> Size {
        self.size
    }
}

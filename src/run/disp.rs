use tui::{buffer::Buffer, layout::Rect, style::Color, widgets::Widget};

use std::fmt;

pub const DISPLAY_WIDTH: usize = 64;
pub const DISPLAY_HEIGHT: usize = 32;
pub const DISPLAY_SIZE: usize = DISPLAY_WIDTH * DISPLAY_HEIGHT;

// One byte per pixel, row-major, each byte either 0 (off) or 1 (on)
pub type DisplayBuffer = [u8; DISPLAY_SIZE];

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Display {
    pub buffer: DisplayBuffer,
}

impl Default for Display {
    fn default() -> Self {
        Self {
            buffer: [0; DISPLAY_SIZE],
        }
    }
}

impl Display {
    pub fn clear(&mut self) {
        self.buffer.fill(0);
    }

    pub fn pixel(&self, x: usize, y: usize) -> bool {
        self.buffer[(y % DISPLAY_HEIGHT) * DISPLAY_WIDTH + x % DISPLAY_WIDTH] == 1
    }

    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        self.buffer.chunks_exact(DISPLAY_WIDTH)
    }

    // XOR an 8 pixel wide sprite (one byte per row, most significant bit on the left) onto the display
    // The origin is taken modulo the display and every pixel wraps around the edges
    // Returns true if any pixel went from on to off
    pub fn draw(&mut self, sprite: &[u8], pos_x: u8, pos_y: u8) -> bool {
        let origin_x = pos_x as usize % DISPLAY_WIDTH;
        let origin_y = pos_y as usize % DISPLAY_HEIGHT;

        let mut collision = false;
        for (row, byte) in sprite.iter().enumerate() {
            let y = (origin_y + row) % DISPLAY_HEIGHT;
            for column in 0..8 {
                if byte >> (7 - column) & 1 == 0 {
                    continue;
                }

                let x = (origin_x + column) % DISPLAY_WIDTH;
                let pixel = &mut self.buffer[y * DISPLAY_WIDTH + x];

                collision |= *pixel == 1;
                *pixel ^= 1;
            }
        }

        collision
    }
}

// Plain text rendition for headless runs, one line per display row
impl fmt::Display for Display {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (y, row) in self.rows().enumerate() {
            if y > 0 {
                writeln!(f)?;
            }
            for &pixel in row {
                write!(f, "{}", if pixel == 1 { '█' } else { ' ' })?;
            }
        }
        Ok(())
    }
}

pub struct DisplayWidget<'a> {
    pub display: &'a Display,
    pub foreground: Color,
    pub background: Color,
}

impl<'a> Widget for DisplayWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // terminal pixel height is twice the width but there is a unicode bottom-half block (▄)
        // so for each cell we use the background color for the upper display row and the foreground for the lower
        // so for each row of the terminal we can fit 2 rows of the display

        let rendered_width = (area.width as usize).min(DISPLAY_WIDTH);
        let rendered_height = (2 * area.height as usize).min(DISPLAY_HEIGHT);

        for y in 0..rendered_height {
            for x in 0..rendered_width {
                let color = if self.display.pixel(x, y) {
                    self.foreground
                } else {
                    self.background
                };

                let cell = buf.get_mut(area.left() + x as u16, area.top() + y as u16 / 2);
                if y % 2 == 0 {
                    cell.set_bg(color);
                } else {
                    cell.set_fg(color).set_symbol("▄");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_sets_pixels_msb_first() {
        let mut display = Display::default();
        let collision = display.draw(&[0b1000_0001], 0, 0);

        assert!(!collision);
        assert!(display.pixel(0, 0));
        assert!(display.pixel(7, 0));
        assert_eq!(display.buffer.iter().filter(|&&p| p == 1).count(), 2);
    }

    #[test]
    fn draw_wraps_origin_and_pixels() {
        let mut display = Display::default();

        // origin (70, 40) wraps to (6, 8)
        display.draw(&[0x80], 70, 40);
        assert!(display.pixel(6, 8));

        // a sprite at the bottom right corner wraps onto the opposite edges
        display.clear();
        display.draw(&[0xFF, 0xFF], 60, 31);
        assert!(display.pixel(63, 31));
        assert!(display.pixel(0, 31));
        assert!(display.pixel(3, 0));
        assert!(!display.pixel(4, 0));
    }

    #[test]
    fn draw_reports_collision_on_set_to_unset() {
        let mut display = Display::default();
        assert!(!display.draw(&[0xF0], 10, 10));
        assert!(display.draw(&[0x10], 10, 10));
        assert!(!display.pixel(13, 10));
        assert!(display.pixel(12, 10));
    }

    #[test]
    fn text_rendition_has_one_line_per_row() {
        let mut display = Display::default();
        display.draw(&[0xC0], 1, 1);

        let text = display.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), DISPLAY_HEIGHT);
        assert!(lines.iter().all(|line| line.chars().count() == DISPLAY_WIDTH));
        assert!(lines[1].starts_with(" ██ "));
        assert!(!lines[0].contains('█'));
    }

    #[test]
    fn clear_zeroes_every_pixel() {
        let mut display = Display::default();
        display.buffer.fill(1);
        display.clear();
        assert!(display.buffer.iter().all(|&p| p == 0));
    }
}

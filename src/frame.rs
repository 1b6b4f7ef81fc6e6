//! Caller-owned RGB staging frame that implements embedded-graphics'
//! DrawTarget.
//!
//! Drawing into a staging frame is plain memory writes; nothing here
//! touches the bitplane buffers. The whole frame is encoded in one pass by
//! [`LedDisplay::frame_publish`](crate::LedDisplay::frame_publish), which
//! costs extra RAM but much less CPU than per-pixel encoding.

use embedded_graphics::{
    draw_target::DrawTarget,
    geometry::{OriginDimensions, Size},
    pixelcolor::{Rgb888, RgbColor},
    Pixel,
};

/// RGB888 staging frame, `W` columns by `H` rows, indexed `[y][x]`.
#[repr(transparent)]
#[derive(Copy, Clone)]
pub struct Frame<const W: usize, const H: usize>(pub [[[u8; 3]; W]; H]);

impl<const W: usize, const H: usize> Frame<W, H> {
    /// A black frame.
    pub const fn new() -> Self {
        Frame([[[0; 3]; W]; H])
    }

    /// Set one pixel. Out-of-range coordinates are silently ignored.
    pub fn set(&mut self, x: usize, y: usize, r: u8, g: u8, b: u8) {
        if x < W && y < H {
            self.0[y][x] = [r, g, b];
        }
    }

    /// Fill the whole frame with one colour.
    pub fn fill(&mut self, r: u8, g: u8, b: u8) {
        if r == g && g == b {
            // Grey levels allow a plain byte fill.
            self.as_mut_bytes().fill(r);
        } else {
            for row in self.0.iter_mut() {
                for px in row.iter_mut() {
                    *px = [r, g, b];
                }
            }
        }
    }

    /// Set all pixels to black.
    pub fn clear(&mut self) {
        self.as_mut_bytes().fill(0);
    }

    /// Return a byte slice that aliases the same memory.
    pub fn as_bytes(&self) -> &[u8] {
        // NOTE(unsafe): The pixel array is tightly packed, so viewing the
        // NOTE(unsafe): whole frame as bytes is valid.
        unsafe {
            core::slice::from_raw_parts(
                self as *const _ as *const u8,
                core::mem::size_of::<Self>(),
            )
        }
    }

    fn as_mut_bytes(&mut self) -> &mut [u8] {
        // NOTE(unsafe): As for as_bytes, via the exclusive reference.
        unsafe {
            core::slice::from_raw_parts_mut(
                self as *mut _ as *mut u8,
                core::mem::size_of::<Self>(),
            )
        }
    }
}

impl<const W: usize, const H: usize> Default for Frame<W, H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const W: usize, const H: usize> OriginDimensions for Frame<W, H> {
    fn size(&self) -> Size {
        Size::new(W as u32, H as u32)
    }
}

impl<const W: usize, const H: usize> DrawTarget for Frame<W, H> {
    type Color = Rgb888;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(coord, color) in pixels.into_iter() {
            if let Ok(pos) = coord.try_into() {
                let (x, y): (u32, u32) = pos;
                self.set(x as usize, y as usize, color.r(), color.g(), color.b());
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.fill(color.r(), color.g(), color.b());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::prelude::*;
    use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};

    #[test]
    fn set_and_ignore_out_of_range() {
        let mut frame: Frame<64, 32> = Frame::new();
        frame.set(10, 5, 1, 2, 3);
        assert_eq!(frame.0[5][10], [1, 2, 3]);
        frame.set(64, 0, 9, 9, 9);
        frame.set(0, 32, 9, 9, 9);
        assert!(frame.as_bytes().iter().filter(|&&b| b != 0).count() == 3);
    }

    #[test]
    fn fill_and_clear() {
        let mut frame: Frame<32, 16> = Frame::new();
        frame.fill(7, 7, 7);
        assert!(frame.as_bytes().iter().all(|&b| b == 7));
        frame.fill(1, 2, 3);
        assert!(frame.0.iter().flatten().all(|px| *px == [1, 2, 3]));
        frame.clear();
        assert!(frame.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn bytes_are_row_major() {
        let mut frame: Frame<64, 32> = Frame::new();
        frame.set(2, 1, 10, 20, 30);
        let base = (1 * 64 + 2) * 3;
        assert_eq!(&frame.as_bytes()[base..base + 3], &[10, 20, 30]);
    }

    #[test]
    fn draw_target_draws_and_clips() {
        let mut frame: Frame<64, 32> = Frame::new();
        Rectangle::new(Point::new(0, 0), Size::new(2, 2))
            .into_styled(PrimitiveStyle::with_fill(Rgb888::RED))
            .draw(&mut frame)
            .unwrap();
        assert_eq!(frame.0[0][0], [255, 0, 0]);
        assert_eq!(frame.0[1][1], [255, 0, 0]);
        // Pixels off the frame are dropped.
        frame.draw_iter([Pixel(Point::new(-1, 0), Rgb888::BLUE)]).unwrap();
        frame.draw_iter([Pixel(Point::new(100, 100), Rgb888::BLUE)]).unwrap();
        assert_eq!(frame.0[0][0], [255, 0, 0]);
    }
}

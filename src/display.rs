//! The LED display driver handle.
//!
//! # Driver operations sequence
//!
//! 1. [`LedDisplay::init`]
//!     * Validates the panel/pin combination
//!     * Allocates the two bitplane buffers from DMA-capable memory and
//!       encodes black into both
//!     * Runs the descriptor planner against the remaining DMA RAM and the
//!       refresh floor, then allocates and links both descriptor rings
//!     * Resets the flip semaphore, registers the completion callback, and
//!       starts the stream engine on buffer 0's ring
//! 2. The producer draws
//!     * either directly into the drawing buffer with [`pixel_xy`] /
//!       [`pixel_fill`], publishing with [`pixel_publish`],
//!     * or into a caller-owned [`Frame`], publishing with
//!       [`frame_publish`]
//! 3. Publishing flips: the engine is asked to switch rings at its next
//!    end-of-list boundary, and the buffer roles swap. The engine's
//!    completion interrupt releases the flip semaphore, which is how the
//!    producer knows its new drawing buffer is no longer being scanned out.
//!
//! A blocking [`pixel_publish`] waits for the semaphore before returning.
//! After a non-blocking publish the producer must not draw until the
//! semaphore would be available, or the panel may show a torn frame.
//! [`frame_publish`] instead waits *before* encoding, so it always writes
//! into an idle buffer and can flip without waiting afterwards.
//!
//! [`pixel_xy`]: LedDisplay::pixel_xy
//! [`pixel_fill`]: LedDisplay::pixel_fill
//! [`pixel_publish`]: LedDisplay::pixel_publish
//! [`frame_publish`]: LedDisplay::frame_publish

use crate::config::{Config, GammaMode};
use crate::encoder;
use crate::engine::{BusWidth, EngineConfig, StreamEngine};
use crate::frame::Frame;
use crate::gamma;
use crate::geometry::Geometry;
use crate::mem::{DmaAllocator, DmaBuf};
use crate::planner::{self, Budget, Plan, PlanError};
use crate::ring::{self, DmaDescriptor};
use crate::sync::{self, SHIFT_COMPLETE};

use embedded_graphics::{
    draw_target::DrawTarget,
    geometry::{OriginDimensions, Size},
    pixelcolor::{Rgb888, RgbColor},
    Pixel,
};

/// Bitplane buffers per display: one being scanned out, one being drawn.
pub const NUM_BUFFERS: usize = 2;

const DEFAULT_BRIGHTNESS: i32 = 75;

/// Errors returned by [`LedDisplay::init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitError {
    /// The panel needs an address line the pin map does not provide.
    InvalidConfig,
    /// A bitplane buffer or descriptor ring did not fit in DMA RAM.
    OutOfMemory,
    /// No descriptor layout reaches the refresh floor within memory.
    RefreshUnachievable,
    /// The stream engine rejected its configuration.
    Hardware,
}

/// Driver handle. Owns the bitplane buffers, the descriptor rings, the
/// brightness state, and the stream engine for as long as it lives;
/// dropping it (or calling [`shutdown`](Self::shutdown)) stops the engine
/// and returns all DMA memory.
pub struct LedDisplay<E: StreamEngine, A: DmaAllocator> {
    engine: E,
    alloc: A,
    geometry: Geometry,
    gamma: GammaMode,
    plan: Plan,
    /// Both bitplane buffers, contiguous: buffer `b` occupies words
    /// `b * geometry.frame_words() ..` of this allocation.
    frames: DmaBuf<u16>,
    descriptors: [DmaBuf<DmaDescriptor>; NUM_BUFFERS],
    brightness_percent: u8,
    /// Column cutoff derived from the percentage, `0..=width`.
    cutoff: usize,
    /// Buffer currently accepting writes.
    current: usize,
}

impl<E: StreamEngine, A: DmaAllocator> LedDisplay<E, A> {
    /// Bring the display up and start streaming (a black frame, initially).
    ///
    /// Any failure returns all memory acquired so far, so a later init can
    /// succeed.
    pub fn init(mut engine: E, mut alloc: A, config: &Config) -> Result<Self, InitError> {
        let geometry = Geometry::new(config.panel);
        if geometry.needs_e && config.pins.e.is_none() {
            warn!("panel needs the E address line but no pin is mapped");
            return Err(InitError::InvalidConfig);
        }

        info!(
            "{}x{} panel, {} bit colour, clock {} Hz",
            geometry.width,
            geometry.height,
            Geometry::DEPTH,
            config.clock.hz(),
        );
        debug!(
            "pins: R1={} G1={} B1={} R2={} G2={} B2={} LAT={} OE={} A={} B={} C={} D={} E={} CLK={}",
            config.pins.r1, config.pins.g1, config.pins.b1, config.pins.r2, config.pins.g2,
            config.pins.b2, config.pins.lat, config.pins.oe, config.pins.a, config.pins.b,
            config.pins.c, config.pins.d,
            config.pins.e.map(i16::from).unwrap_or(-1),
            config.pins.clk,
        );

        // Two bitplane buffers, contiguous in DMA-capable memory.
        let frame_words = geometry.frame_words();
        debug!(
            "frame buffers: {} bytes (DMA free total={} largest={})",
            NUM_BUFFERS * frame_words * 2,
            alloc.free_size(),
            alloc.largest_free_block(),
        );
        let mut frames = match DmaBuf::<u16>::alloc(&mut alloc, NUM_BUFFERS * frame_words) {
            Some(buf) => buf,
            None => {
                warn!("framebuf alloc");
                return Err(InitError::OutOfMemory);
            }
        };

        // Choose the LSB->MSB transition point against what's left.
        let budget = Budget {
            largest_free: alloc.largest_free_block(),
            total_free: alloc.free_size(),
            reserve: config.reserve_ram,
            min_refresh_hz: config.min_refresh_hz,
        };
        let plan = match planner::plan(&geometry, config.clock.hz(), &budget) {
            Ok(plan) => plan,
            Err(e) => {
                // NOTE(unsafe): freshly allocated above, engine not started.
                unsafe { frames.free(&mut alloc) };
                return Err(match e {
                    PlanError::Ram => {
                        warn!("descriptor rings do not fit in DMA RAM");
                        InitError::OutOfMemory
                    }
                    PlanError::Refresh => {
                        warn!("refresh floor unreachable");
                        InitError::RefreshUnachievable
                    }
                });
            }
        };

        // Start dark: encode black with the output fully gated off.
        for buffer in frames.as_mut_slice().chunks_exact_mut(frame_words) {
            encoder::encode_fill(buffer, &geometry, plan.transition_bit as usize, 0, [0, 0, 0]);
        }

        // Allocate and link one descriptor ring per buffer.
        let count = plan.descriptors_per_row * geometry.rows;
        let mut desc_a = match DmaBuf::<DmaDescriptor>::alloc(&mut alloc, count) {
            Some(buf) => buf,
            None => {
                warn!("descriptor ring A alloc");
                // NOTE(unsafe): as above; nothing references these yet.
                unsafe { frames.free(&mut alloc) };
                return Err(InitError::OutOfMemory);
            }
        };
        let mut desc_b = match DmaBuf::<DmaDescriptor>::alloc(&mut alloc, count) {
            Some(buf) => buf,
            None => {
                warn!("descriptor ring B alloc");
                // NOTE(unsafe): as above; nothing references these yet.
                unsafe {
                    desc_a.free(&mut alloc);
                    frames.free(&mut alloc);
                }
                return Err(InitError::OutOfMemory);
            }
        };

        let (words_a, words_b) = frames.as_slice().split_at(frame_words);
        let ring_a = ring::build_ring(desc_a.as_mut_slice(), words_a, &geometry, &plan);
        let ring_b = ring::build_ring(desc_b.as_mut_slice(), words_b, &geometry, &plan);

        // Fresh flip semaphore; the engine's end-of-list ISR releases it.
        SHIFT_COMPLETE.reset();
        engine.set_shiftcomplete_callback(sync::shift_complete_isr);

        let pins = &config.pins;
        let engine_config = EngineConfig {
            bus: [
                Some(pins.r1),
                Some(pins.g1),
                Some(pins.b1),
                Some(pins.r2),
                Some(pins.g2),
                Some(pins.b2),
                Some(pins.lat),
                Some(pins.oe),
                Some(pins.a),
                Some(pins.b),
                Some(pins.c),
                Some(pins.d),
                pins.e,
                None,
                None,
                None,
            ],
            clk: pins.clk,
            clock_hz: config.clock.hz(),
            bits: BusWidth::Sixteen,
            ring_a,
            ring_b,
        };
        if engine.setup(&engine_config).is_err() {
            warn!("stream engine setup");
            // NOTE(unsafe): setup failed, so the engine never started
            // NOTE(unsafe): reading the rings or buffers.
            unsafe {
                desc_b.free(&mut alloc);
                desc_a.free(&mut alloc);
                frames.free(&mut alloc);
            }
            return Err(InitError::Hardware);
        }

        let mut display = LedDisplay {
            engine,
            alloc,
            geometry,
            gamma: config.gamma,
            plan,
            frames,
            descriptors: [desc_a, desc_b],
            brightness_percent: 0,
            cutoff: 0,
            current: 0,
        };
        display.set_brightness(DEFAULT_BRIGHTNESS);
        info!("init done");
        Ok(display)
    }

    /// Stop the stream engine and release all driver memory. Equivalent to
    /// dropping the handle.
    ///
    /// Must not be called while another task is blocked in a publish.
    pub fn shutdown(self) {}

    /// Set the global brightness, returning the previous setting.
    ///
    /// The input is clamped to 0..=100 percent. Takes effect from the next
    /// encoded pixel or frame; the frame being scanned out is unaffected.
    pub fn set_brightness(&mut self, percent: i32) -> u8 {
        let last = self.brightness_percent;
        let width = self.geometry.width as i32;
        if percent <= 0 {
            self.brightness_percent = 0;
            self.cutoff = 0;
        } else if percent >= 100 {
            self.brightness_percent = 100;
            self.cutoff = self.geometry.width;
        } else {
            self.brightness_percent = percent as u8;
            // Scale percent to a column cutoff; the extra factor of 1000
            // keeps the intermediate product in range.
            let linear = (((1000 * width * percent) + 500) / 1000) / 100;
            self.cutoff = match self.gamma {
                GammaMode::Off => linear as usize,
                GammaMode::Strict => {
                    let f = 256 / width;
                    (gamma::pwm((linear * f) as u8) as i32 / f) as usize
                }
                GammaMode::Modified => {
                    let f = 256 / width;
                    let lut = gamma::pwm((linear * f) as u8) as i32 / f;
                    // Never gate the panel fully dark from a nonzero input.
                    if lut <= 0 {
                        1
                    } else {
                        lut as usize
                    }
                }
            };
        }
        last
    }

    /// The current brightness in percent.
    pub fn brightness(&self) -> u8 {
        self.brightness_percent
    }

    /// Set one pixel of the drawing buffer.
    ///
    /// Out-of-range coordinates are silently ignored. The colour bits of
    /// the pixel's opposite-half partner (same column, other colour bus)
    /// are preserved.
    pub fn pixel_xy(&mut self, x: usize, y: usize, r: u8, g: u8, b: u8) {
        if x >= self.geometry.width || y >= self.geometry.height {
            return;
        }
        let rgb = [
            gamma::correct(self.gamma, r),
            gamma::correct(self.gamma, g),
            gamma::correct(self.gamma, b),
        ];
        let frame_words = self.geometry.frame_words();
        let words = &mut self.frames.as_mut_slice()[self.current * frame_words..][..frame_words];
        encoder::encode_pixel(
            words,
            &self.geometry,
            self.plan.transition_bit as usize,
            self.cutoff,
            x,
            y,
            rgb,
        );
    }

    /// Fill the whole drawing buffer with one colour.
    pub fn pixel_fill(&mut self, r: u8, g: u8, b: u8) {
        let rgb = [
            gamma::correct(self.gamma, r),
            gamma::correct(self.gamma, g),
            gamma::correct(self.gamma, b),
        ];
        let frame_words = self.geometry.frame_words();
        let words = &mut self.frames.as_mut_slice()[self.current * frame_words..][..frame_words];
        encoder::encode_fill(
            words,
            &self.geometry,
            self.plan.transition_bit as usize,
            self.cutoff,
            rgb,
        );
    }

    /// Publish the drawing buffer: the engine switches to it at its next
    /// end-of-list boundary, and the other buffer becomes the drawing
    /// buffer.
    ///
    /// With `block`, waits until the engine has actually released the new
    /// drawing buffer. Without, the caller must not draw again until it
    /// would have; drawing earlier can scan out a torn frame.
    pub fn pixel_publish(&mut self, block: bool) {
        self.engine.flip_to(self.current);
        self.current = (self.current + 1) % NUM_BUFFERS;
        if block {
            SHIFT_COMPLETE.acquire();
        }
    }

    /// Encode a staging frame into the drawing buffer and publish it.
    ///
    /// Waits for the drawing buffer to be released by the engine before
    /// encoding, then flips without blocking. The frame's dimensions must
    /// match the panel; a mismatched frame is ignored.
    pub fn frame_publish<const W: usize, const H: usize>(&mut self, frame: &Frame<W, H>) {
        if W != self.geometry.width || H != self.geometry.height {
            warn!(
                "frame {}x{} does not fit {}x{} panel",
                W, H, self.geometry.width, self.geometry.height,
            );
            return;
        }

        // Wait until the drawing buffer is out from under the engine.
        SHIFT_COMPLETE.acquire();

        let frame_words = self.geometry.frame_words();
        let words = &mut self.frames.as_mut_slice()[self.current * frame_words..][..frame_words];
        encoder::encode_frame(
            words,
            &self.geometry,
            self.plan.transition_bit as usize,
            self.cutoff,
            self.gamma,
            frame.as_bytes(),
        );

        self.engine.flip_to(self.current);
        self.current = (self.current + 1) % NUM_BUFFERS;
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// The refresh rate the descriptor planner settled on, in Hz.
    pub fn refresh_hz(&self) -> u32 {
        self.plan.refresh_hz
    }

    /// The LSB->MSB transition bit the descriptor planner settled on.
    pub fn transition_bit(&self) -> u8 {
        self.plan.transition_bit
    }
}

impl<E: StreamEngine, A: DmaAllocator> Drop for LedDisplay<E, A> {
    fn drop(&mut self) {
        info!("shutdown");
        self.engine.stop();
        // NOTE(unsafe): The engine is stopped so DMA no longer reads the
        // NOTE(unsafe): rings or buffers, and drop runs at most once.
        unsafe {
            self.frames.free(&mut self.alloc);
            for slab in self.descriptors.iter_mut() {
                slab.free(&mut self.alloc);
            }
        }
    }
}

impl<E: StreamEngine, A: DmaAllocator> OriginDimensions for LedDisplay<E, A> {
    fn size(&self) -> Size {
        Size::new(self.geometry.width as u32, self.geometry.height as u32)
    }
}

impl<E: StreamEngine, A: DmaAllocator> DrawTarget for LedDisplay<E, A> {
    type Color = Rgb888;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(coord, color) in pixels.into_iter() {
            if let Ok(pos) = coord.try_into() {
                let (x, y): (u32, u32) = pos;
                self.pixel_xy(x as usize, y as usize, color.r(), color.g(), color.b());
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.pixel_fill(color.r(), color.g(), color.b());
        Ok(())
    }
}

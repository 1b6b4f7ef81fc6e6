//! The parallel stream engine seam.
//!
//! The engine is the hardware half of the driver: a peripheral which shifts
//! one 16-bit word out over sixteen GPIO lanes on every pixel clock,
//! fetching words by walking a [`DescriptorRing`]. The driver only ever
//! talks to it through this trait; everything timing-critical (clock
//! dividers, FIFO setup, the end-of-list interrupt) stays behind it.

use crate::ring::DescriptorRing;

/// Word width the engine shifts per pixel clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusWidth {
    Sixteen = 16,
    ThirtyTwo = 32,
}

/// Completion callback, invoked from the engine's end-of-list interrupt.
///
/// Must be interrupt-safe: no allocation, no blocking.
pub type ShiftCompleteCallback = fn();

/// Everything the engine needs at setup.
pub struct EngineConfig {
    /// GPIO for each output lane, in control-word bit order
    /// (R1 G1 B1 R2 G2 B2 LAT OE A B C D E; lanes 13..16 unused).
    pub bus: [Option<u8>; 16],
    /// GPIO for the pixel clock.
    pub clk: u8,
    /// Pixel clock frequency in Hz.
    pub clock_hz: u32,
    pub bits: BusWidth,
    /// Ring for buffer 0. The engine starts on this ring.
    pub ring_a: DescriptorRing,
    /// Ring for buffer 1.
    pub ring_b: DescriptorRing,
}

/// Contract for the parallel stream engine.
///
/// Once set up, the engine runs autonomously: it loops its current ring
/// indefinitely, emitting one word per clock. At each descriptor marked
/// end-of-list it fires the completion callback, and if a flip was
/// requested since the last boundary it atomically switches to the other
/// ring's head before continuing. `stop` halts the clock and releases the
/// rings; it must only be called when no publisher is blocked on the
/// completion callback.
pub trait StreamEngine {
    type Error;

    /// Configure lanes, clock, and descriptor rings, and start streaming
    /// from ring A.
    fn setup(&mut self, config: &EngineConfig) -> Result<(), Self::Error>;

    /// Register the callback fired from the end-of-list interrupt.
    fn set_shiftcomplete_callback(&mut self, callback: ShiftCompleteCallback);

    /// Arm a flip: at the next end-of-list boundary, start reading the
    /// given buffer's ring from its head.
    fn flip_to(&mut self, buffer: usize);

    /// Stop streaming.
    fn stop(&mut self);
}

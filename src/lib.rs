//! Driver core for HUB75 RGB LED matrix panels, fed by a free-running
//! parallel stream engine and a DMA descriptor ring.
//!
//! # HUB75 concept of operation
//!
//! The HUB75 interface has four or five row-select ("address") pins A-E,
//! six data pins (R1, G1, B1, R2, G2, B2), and clock, latch, and
//! output-enable pins. The panel holds no frame memory: each address
//! selects two physical rows (one in the top half, one in the bottom, each
//! with its own colour bus) which light up only while they are selected,
//! so the host must re-scan the whole panel continuously.
//!
//! To paint a row pair, the host shifts one bit per colour per column into
//! the panel's shift registers, pulsing the latch on the final column, and
//! keeps OE (active-low) asserted for the time the row should be visible.
//! Since each LED is only on or off, grayscale comes from binary code
//! modulation (BCM): bit `i` of each 8-bit colour channel is displayed in
//! its own sub-frame ("bitplane") whose on-time is proportional to `2^i`.
//!
//! # Driver concept of operation
//!
//! Instead of bit-banging, this driver encodes the whole panel into
//! memory: for every half-row and every bitplane it stores one 16-bit
//! control word per column, carrying the six colour bits for both panel
//! halves together with the row address, latch, and OE signals
//! (see [`EngineConfig::bus`] for the lane order). An external parallel
//! stream engine (some peripheral able to emit a 16-bit word over sixteen
//! GPIOs on every pixel clock) then streams those words by walking a ring
//! of DMA descriptors, with no CPU involvement at all.
//!
//! The BCM weighting falls out of the descriptor ring's layout rather than
//! any timer: each row contributes one descriptor sweeping all eight
//! bitplanes once, plus `2^(i-t-1)` extra descriptors re-sweeping planes
//! `i..8` for every plane `i` above a transition bit `t`. Linear traversal
//! therefore shows plane `i <= t` once and plane `i > t` exactly `2^(i-t)`
//! times; within the single sweep, the low planes get their relative
//! weights from OE gating alone. The transition bit trades DMA RAM
//! (more repeats, more descriptors) against refresh rate, and is chosen at
//! init by a [planner](Plan) working from the allocator's free-space
//! reports and a configured refresh floor.
//!
//! Frames are double-buffered: the engine loops one buffer's ring while
//! the producer draws into the other, either per-pixel or by bulk-encoding
//! a caller-owned RGB [`Frame`]. Publishing asks the engine to flip rings
//! at its next end-of-list boundary; the engine's completion interrupt
//! releases a binary semaphore ([`ShiftSync`]) which is what producers
//! block on to know their buffer is safe to touch. See [`LedDisplay`] for
//! the publish protocol details.

#![cfg_attr(not(test), no_std)]

// This must go first so the other modules see its macros.
mod fmt;

mod config;
mod display;
mod encoder;
mod engine;
mod frame;
mod gamma;
mod geometry;
mod mem;
mod planner;
mod ring;
mod sync;

pub use config::{ClockSpeed, Config, GammaMode, PinMap};
pub use display::{InitError, LedDisplay, NUM_BUFFERS};
pub use engine::{BusWidth, EngineConfig, ShiftCompleteCallback, StreamEngine};
pub use frame::Frame;
pub use gamma::pwm;
pub use geometry::{Geometry, PanelKind};
pub use mem::DmaAllocator;
pub use planner::{Plan, SliceRun};
pub use ring::{DescriptorRing, DmaDescriptor};
pub use sync::ShiftSync;

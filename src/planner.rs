//! Descriptor planner: picks the LSB->MSB transition bit.
//!
//! One pass of the descriptor ring must show bitplane `i` for a time
//! proportional to `2^i`. Repeating descriptors for the upper planes gets
//! expensive in DMA RAM, and showing every plane separately gets expensive
//! in shift-out time, so a transition bit `t` splits the planes: everything
//! up to and including `t` is covered by a single linear sweep through all
//! planes (their weighting comes from OE gating), while each plane above
//! `t` is re-swept `2^(i-t-1)` more times from plane `i` to the MSB. The
//! planner searches for the smallest `t` whose descriptor count fits the
//! DMA RAM budget while the resulting refresh rate still meets the floor.

use heapless::Vec;

use crate::geometry::Geometry;
use crate::ring::DmaDescriptor;

/// A run of identical descriptors within one row: `count` descriptors, each
/// covering bitplanes `start_plane..DEPTH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SliceRun {
    pub start_plane: u8,
    pub count: u16,
}

/// The planner's result: the chosen transition bit and the per-row
/// descriptor schedule, identical for every row and both buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// Chosen LSB->MSB transition bit, `0..DEPTH`.
    pub transition_bit: u8,
    /// Descriptors per row, `K = schedule total`.
    pub descriptors_per_row: usize,
    /// Refresh rate achieved with this plan, in Hz.
    pub refresh_hz: u32,
    /// DMA RAM needed for both descriptor rings, in bytes.
    pub ram_required: usize,
    /// Descriptor runs making up one row, first the full LSB..MSB sweep,
    /// then the repeated MSB suffixes.
    pub schedule: Vec<SliceRun, { Geometry::DEPTH }>,
}

/// Memory and refresh constraints for the search.
pub(crate) struct Budget {
    pub largest_free: usize,
    pub total_free: usize,
    pub reserve: usize,
    pub min_refresh_hz: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PlanError {
    /// No transition bit fits the descriptor rings in DMA RAM.
    Ram,
    /// The refresh floor is unreachable even at the maximum transition bit.
    Refresh,
}

/// Descriptors needed per row for transition bit `t`:
/// one full sweep plus the MSB suffix repeats.
pub(crate) fn descriptors_per_row(t: usize) -> usize {
    let mut n = 1;
    for i in t + 1..Geometry::DEPTH {
        n += 1 << (i - t - 1);
    }
    n
}

/// Refresh rate in Hz for transition bit `t` at the given pixel clock.
pub(crate) fn refresh_rate(geo: &Geometry, clock_hz: u32, t: usize) -> u32 {
    let ps_per_clock = 1_000_000_000_000u64 / clock_hz as u64;
    let ns_per_latch = (geo.width as u64 * ps_per_clock) / 1000;
    // One latch period per plane for the full sweep, then the repeated
    // suffixes. Sub-nanosecond fractions are dropped, as is one clock of
    // latch overhead per period; the error is well under a percent.
    let mut ns_per_row = Geometry::DEPTH as u64 * ns_per_latch;
    for i in t + 1..Geometry::DEPTH {
        ns_per_row += (1u64 << (i - t - 1)) * (Geometry::DEPTH - i) as u64 * ns_per_latch;
    }
    let ns_per_frame = ns_per_row * geo.rows as u64;
    (1_000_000_000u64 / ns_per_frame) as u32
}

/// Build the per-row descriptor schedule for transition bit `t`.
fn schedule(t: usize) -> Vec<SliceRun, { Geometry::DEPTH }> {
    let mut runs = Vec::new();
    // The full sweep covers every plane once, which is all the planes up
    // to and including `t` ever get.
    runs.push(SliceRun { start_plane: 0, count: 1 }).unwrap();
    for i in t + 1..Geometry::DEPTH {
        runs.push(SliceRun {
            start_plane: i as u8,
            count: 1 << (i - t - 1),
        })
        .unwrap();
    }
    runs
}

/// Search for the lowest transition bit meeting both budgets.
pub(crate) fn plan(geo: &Geometry, clock_hz: u32, budget: &Budget) -> Result<Plan, PlanError> {
    let mut t = 0;
    loop {
        let per_row = descriptors_per_row(t);
        let ram_required =
            per_row * geo.rows * crate::display::NUM_BUFFERS * core::mem::size_of::<DmaDescriptor>();
        let refresh_hz = refresh_rate(geo, clock_hz, t);

        let ram_ok = ram_required < budget.largest_free
            && ram_required < budget.total_free.saturating_sub(budget.reserve);
        let refresh_ok = refresh_hz >= budget.min_refresh_hz;

        debug!(
            "transition_bit={}: ram={} (total={} largest={}) ok={}, refresh={} ok={}",
            t, ram_required, budget.total_free, budget.largest_free, ram_ok, refresh_hz, refresh_ok,
        );

        if ram_ok && refresh_ok {
            debug!(
                "planned: transition_bit={}/{} descriptors_per_row={} refresh={}",
                t,
                Geometry::DEPTH - 1,
                per_row,
                refresh_hz,
            );
            return Ok(Plan {
                transition_bit: t as u8,
                descriptors_per_row: per_row,
                refresh_hz,
                ram_required,
                schedule: schedule(t),
            });
        }

        // Raising `t` shrinks both the ring and the scan-out time; give up
        // once it cannot go further. When both budgets fail, report the
        // memory shortfall.
        if t < Geometry::DEPTH - 1 {
            t += 1;
        } else if !ram_ok {
            return Err(PlanError::Ram);
        } else {
            return Err(PlanError::Refresh);
        }
    }
}

//! Panel geometry: the supported panel types and their derived scan layout.

/// Supported panel types.
///
/// Each variant names the pixel dimensions and the scan rate. Only panels
/// which drive two rows in parallel (one per colour bus) work with this
/// driver; the 4-scan 32x16 and the 8-scan 32x32 and 64x32 variants found
/// in the wild drive four rows at once and are not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PanelKind {
    /// 32x16 pixels, 1/8 scan.
    W32H16Scan8,
    /// 32x32 pixels, 1/16 scan.
    W32H32Scan16,
    /// 64x32 pixels, 1/16 scan.
    W64H32Scan16,
    /// 64x64 pixels, 1/32 scan. Requires the E address line.
    W64H64Scan32,
}

/// Scan geometry derived from a [`PanelKind`], frozen after init.
///
/// `rows` counts the address steps per frame: two physical rows (one in
/// each panel half) are refreshed per address, so `rows = height / 2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Geometry {
    /// Panel width in pixels, which is also the number of pixels per latch.
    pub width: usize,
    /// Panel height in pixels.
    pub height: usize,
    /// Half-rows per frame, `height / 2`.
    pub rows: usize,
    /// Whether the fifth address line E must be driven.
    pub needs_e: bool,
}

impl Geometry {
    /// Colour depth in bits per channel; one bitplane per bit.
    pub const DEPTH: usize = 8;

    pub const fn new(kind: PanelKind) -> Self {
        let (width, height, needs_e) = match kind {
            PanelKind::W32H16Scan8 => (32, 16, false),
            PanelKind::W32H32Scan16 => (32, 32, false),
            PanelKind::W64H32Scan16 => (64, 32, false),
            PanelKind::W64H64Scan32 => (64, 64, true),
        };
        Geometry { width, height, rows: height / 2, needs_e }
    }

    /// Number of 16-bit words in one bitplane buffer:
    /// `rows` x [`DEPTH`](Self::DEPTH) bitplanes x `width` columns.
    pub const fn frame_words(&self) -> usize {
        self.rows * Self::DEPTH * self.width
    }

    /// Flat word index of column `x` on bitplane `plane` of half-row `row`.
    ///
    /// Adjacent even/odd columns swap places (`x ^ 1`): the parallel FIFO
    /// emits the two 16-bit halves of each 32-bit burst in reverse order,
    /// so the swap in memory produces ascending column order on the bus.
    pub const fn word_index(&self, row: usize, plane: usize, x: usize) -> usize {
        (row * Self::DEPTH + plane) * self.width + (x ^ 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_dimensions() {
        for (kind, w, h) in [
            (PanelKind::W32H16Scan8, 32, 16),
            (PanelKind::W32H32Scan16, 32, 32),
            (PanelKind::W64H32Scan16, 64, 32),
            (PanelKind::W64H64Scan32, 64, 64),
        ] {
            let geo = Geometry::new(kind);
            assert_eq!(geo.width, w);
            assert_eq!(geo.height, h);
            assert_eq!(geo.rows, h / 2);
            assert_eq!(geo.frame_words(), (h / 2) * 8 * w);
        }
        assert!(Geometry::new(PanelKind::W64H64Scan32).needs_e);
        assert!(!Geometry::new(PanelKind::W64H32Scan16).needs_e);
    }

    #[test]
    fn word_index_swaps_adjacent_columns() {
        let geo = Geometry::new(PanelKind::W64H32Scan16);
        assert_eq!(geo.word_index(0, 0, 0), 1);
        assert_eq!(geo.word_index(0, 0, 1), 0);
        assert_eq!(geo.word_index(0, 0, 62), 63);
        assert_eq!(geo.word_index(0, 0, 63), 62);
        // Rows and planes are laid out linearly.
        assert_eq!(geo.word_index(0, 1, 0), 64 + 1);
        assert_eq!(geo.word_index(1, 0, 0), 8 * 64 + 1);
    }

    #[test]
    fn word_index_stays_in_frame() {
        let geo = Geometry::new(PanelKind::W64H64Scan32);
        for row in 0..geo.rows {
            for plane in 0..Geometry::DEPTH {
                for x in 0..geo.width {
                    assert!(geo.word_index(row, plane, x) < geo.frame_words());
                }
            }
        }
    }
}

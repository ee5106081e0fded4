//! Public façade: `Backend` owns a pyramid's levels and exposes the
//! operations described in `SPEC_FULL.md` §6.

use crate::error::{FormatError, RegionError};
use crate::model::{Level, TileKey};
use crate::{pyramid, router};

/// A constructed pyramid, ready to serve regions.
///
/// Teardown (closing files, freeing `mcu_starts` and comments, dropping the
/// level array) is automatic on drop — the explicit `destroy()` of the
/// original C backend becomes ordinary Rust ownership-scoped teardown.
pub struct Backend {
    levels: Vec<Level>,
}

impl Backend {
    /// Consumes `fragments` (in `(z, x, y)` order) and builds the full
    /// pyramid. Aborts with no partial `Backend` on any ordering, density,
    /// or per-file format violation.
    pub fn add_jpeg_ops(fragments: Vec<crate::model::Fragment>) -> Result<Self, FormatError> {
        let levels = pyramid::build(fragments)?;
        tracing::debug!(level_count = levels.len(), "pyramid built");
        Ok(Self { levels })
    }

    /// Writes `w * h` BGRA pixels into `dest` (row-major, pitch `w`), and
    /// returns the [`TileKey`] of every file sub-rectangle that contributed
    /// to the write, for a caller to use as a decoded-tile cache key.
    ///
    /// On error, `dest` is left partially filled; callers that need defined
    /// contents on failure should zero-initialize before calling.
    pub fn read_region(
        &self,
        dest: &mut [u32],
        x: u32,
        y: u32,
        level: usize,
        w: u32,
        h: u32,
    ) -> Result<Vec<TileKey>, RegionError> {
        let Some(level) = self.levels.get(level) else {
            return Ok(Vec::new());
        };
        router::read_region(level, dest, x, y, w, h)
    }

    /// Published (scaled) dimensions of `level`, or `(0, 0)` if out of range.
    pub fn get_dimensions(&self, level: usize) -> (u32, u32) {
        self.levels.get(level).map(Level::published_dimensions).unwrap_or((0, 0))
    }

    /// The comment of the first JPEG indexed, if any.
    pub fn get_comment(&self) -> Option<&str> {
        self.levels
            .first()
            .and_then(|l| l.jpegs.first())
            .and_then(|j| j.comment.as_deref())
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_level_has_zero_dimensions() {
        let backend = Backend { levels: Vec::new() };
        assert_eq!(backend.get_dimensions(0), (0, 0));
    }

    #[test]
    fn out_of_range_level_writes_nothing() {
        let backend = Backend { levels: Vec::new() };
        let mut dest = vec![0xAAAAAAAAu32; 4];
        backend.read_region(&mut dest, 0, 0, 0, 2, 2).unwrap();
        assert!(dest.iter().all(|&p| p == 0xAAAAAAAA));
    }
}

//! Builds the sorted `Level[]` from an ordered fragment list. See
//! `SPEC_FULL.md` §4.3.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::FormatError;
use crate::jpeg::index::index_jpeg;
use crate::model::{Fragment, Level, OneJpeg};

const SCALE_DENOMS: [u32; 4] = [1, 2, 4, 8];

struct LevelAccumulator {
    z: u32,
    pixel_w: u32,
    pixel_h: u32,
    image00_w: u32,
    image00_h: u32,
    last_x: u32,
    last_y: u32,
    jpegs: Vec<Arc<OneJpeg>>,
}

impl LevelAccumulator {
    fn new(z: u32) -> Self {
        Self {
            z,
            pixel_w: 0,
            pixel_h: 0,
            image00_w: 0,
            image00_h: 0,
            last_x: 0,
            last_y: 0,
            jpegs: Vec::new(),
        }
    }
}

/// Indexes every fragment's file and assembles the sorted, four-scale-per-z
/// `Level[]`. Aborts the whole build (no partial result) on any ordering or
/// density violation, matching §7: setup errors are all-or-nothing.
pub fn build(fragments: Vec<Fragment>) -> Result<Vec<Level>, FormatError> {
    if fragments.is_empty() {
        return Ok(Vec::new());
    }

    let mut levels = Vec::new();
    let mut acc = LevelAccumulator::new(0);
    let mut prev: Option<(u32, u32, u32)> = None;

    for fragment in fragments {
        let (z, x, y) = (fragment.z, fragment.x, fragment.y);
        match prev {
            None => {
                if (z, x, y) != (0, 0, 0) {
                    return Err(FormatError::FirstFragmentNotOrigin { got: (z, x, y) });
                }
            }
            Some(p) => {
                if !is_successor(p, (z, x, y)) {
                    return Err(FormatError::FragmentOrderViolation {
                        prev: p,
                        got: (z, x, y),
                    });
                }
            }
        }

        if z != acc.z {
            flush_level(&mut acc, &mut levels)?;
            acc = LevelAccumulator::new(z);
        }

        let jpeg = Arc::new(index_jpeg(&fragment.path)?);
        if y == 0 {
            acc.pixel_w += jpeg.width;
        }
        if x == 0 {
            acc.pixel_h += jpeg.height;
        }
        if x == 0 && y == 0 {
            acc.image00_w = jpeg.width;
            acc.image00_h = jpeg.height;
        }
        acc.last_x = x;
        acc.last_y = y;
        acc.jpegs.push(jpeg);

        prev = Some((z, x, y));
    }
    flush_level(&mut acc, &mut levels)?;

    Ok(emit_scaled_levels(levels))
}

fn is_successor(prev: (u32, u32, u32), next: (u32, u32, u32)) -> bool {
    let (pz, px, py) = prev;
    let (z, x, y) = next;
    (z == pz + 1 && x == 0 && y == 0) || (z == pz && y == py + 1 && x == 0) || (z == pz && y == py && x == px + 1)
}

struct FlushedLevel {
    jpegs_across: u32,
    jpegs_down: u32,
    pixel_w: u32,
    pixel_h: u32,
    image00_w: u32,
    image00_h: u32,
    jpegs: Vec<Arc<OneJpeg>>,
}

fn flush_level(acc: &mut LevelAccumulator, out: &mut Vec<FlushedLevel>) -> Result<(), FormatError> {
    let jpegs_across = acc.last_x + 1;
    let jpegs_down = acc.last_y + 1;
    let expected = (jpegs_across as usize) * (jpegs_down as usize);
    if acc.jpegs.len() != expected {
        return Err(FormatError::GridDensityViolation {
            level: acc.z,
            expected,
            actual: acc.jpegs.len(),
        });
    }

    out.push(FlushedLevel {
        jpegs_across,
        jpegs_down,
        pixel_w: acc.pixel_w,
        pixel_h: acc.pixel_h,
        image00_w: acc.image00_w,
        image00_h: acc.image00_h,
        jpegs: std::mem::take(&mut acc.jpegs),
    });
    Ok(())
}

/// Emits four `scale_denom`-varied `Level`s per flushed `z`, deduplicates by
/// published width keeping the first writer, and sorts descending.
///
/// `spec.md` §9 flags last-writer-wins on a published-width collision as
/// "almost certainly unintended"; this keeps the first level that claims a
/// given width and logs the discard, per the Open Question decision in
/// `DESIGN.md`.
fn emit_scaled_levels(flushed: Vec<FlushedLevel>) -> Vec<Level> {
    let level0_pixel_w = flushed.first().map(|l| l.pixel_w).unwrap_or(1).max(1);

    let mut by_width: BTreeMap<u32, Level> = BTreeMap::new();
    for f in &flushed {
        let no_scale_denom_downsample = level0_pixel_w / f.pixel_w.max(1);
        for &scale_denom in &SCALE_DENOMS {
            let published_width = f.pixel_w / scale_denom;
            let level = Level {
                jpegs_across: f.jpegs_across,
                jpegs_down: f.jpegs_down,
                pixel_w: f.pixel_w,
                pixel_h: f.pixel_h,
                image00_w: f.image00_w,
                image00_h: f.image00_h,
                scale_denom,
                no_scale_denom_downsample,
                jpegs: f.jpegs.clone(),
            };
            match by_width.entry(published_width) {
                std::collections::btree_map::Entry::Vacant(e) => {
                    e.insert(level);
                }
                std::collections::btree_map::Entry::Occupied(_) => {
                    tracing::warn!(
                        published_width,
                        scale_denom,
                        "discarding pyramid level: published width collides with an earlier level"
                    );
                }
            }
        }
    }

    let mut levels: Vec<Level> = by_width.into_values().collect();
    levels.sort_by(|a, b| b.published_dimensions().0.cmp(&a.published_dimensions().0));
    levels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successor_rules() {
        assert!(is_successor((0, 0, 0), (0, 1, 0)));
        assert!(is_successor((0, 1, 0), (0, 0, 1)));
        assert!(is_successor((0, 0, 1), (1, 0, 0)));
        assert!(!is_successor((0, 0, 0), (0, 0, 1)));
        assert!(!is_successor((0, 1, 0), (0, 2, 0)));
    }

    #[test]
    fn empty_fragment_list_yields_no_levels() {
        assert!(build(Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn first_fragment_must_be_origin() {
        let err = build(vec![Fragment::new(0, 1, 0, "missing.jpg")]).unwrap_err();
        assert!(matches!(err, FormatError::FirstFragmentNotOrigin { got: (0, 1, 0) }));
    }
}

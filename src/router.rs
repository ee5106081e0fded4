//! Maps an output-coordinate region request across a `Level`'s file grid and
//! dispatches per-file decodes. See `SPEC_FULL.md` §4.4.

use tracing::debug_span;

use crate::error::RegionError;
use crate::model::{Level, TileKey};
use crate::reader;

/// Writes exactly `w * h` BGRA pixels into `dest` (row-major, pitch `w`), and
/// returns the [`TileKey`] of every file sub-rectangle that contributed to
/// the write — the natural cache key a caller sitting in front of this can
/// use to memoize each decoded tile (§6).
///
/// `x, y, w, h` are in `level`'s published (scaled) coordinate space. Never
/// emits overlapping writes; fills `dest` contiguously across however many
/// files the region intersects.
pub fn read_region(
    level: &Level,
    dest: &mut [u32],
    x: u32,
    y: u32,
    w: u32,
    h: u32,
) -> Result<Vec<TileKey>, RegionError> {
    let s = level.scale_denom;
    let d = level.no_scale_denom_downsample;

    let src_x0 = (x * d / s) * s;
    let src_y0 = (y * d / s) * s;
    let end_src_x = (src_x0 + w * s).min(level.pixel_w);
    let end_src_y = (src_y0 + h * s).min(level.pixel_h);

    let mut touched = Vec::new();
    let mut src_y = src_y0;
    while src_y < end_src_y {
        let file_y = src_y / level.image00_h;
        let origin_y = file_y * level.image00_h;
        let end_in_file_y = ((file_y + 1) * level.image00_h).min(end_src_y) - origin_y;
        let start_in_file_y = src_y - origin_y;
        let dest_h = (end_in_file_y - start_in_file_y) / s;

        let mut src_x = src_x0;
        while src_x < end_src_x {
            let file_x = src_x / level.image00_w;
            let origin_x = file_x * level.image00_w;
            let end_in_file_x = ((file_x + 1) * level.image00_w).min(end_src_x) - origin_x;
            let start_in_file_x = src_x - origin_x;
            let dest_w = (end_in_file_x - start_in_file_x) / s;

            if dest_w > 0 && dest_h > 0 {
                let dest_x = (src_x - src_x0) / s;
                let dest_y = (src_y - src_y0) / s;
                let file_index = (file_y * level.jpegs_across + file_x) as usize;

                let span = debug_span!(
                    "read_region_file",
                    file_index,
                    start_in_file_x,
                    start_in_file_y,
                    scale_denom = s,
                    dest_w,
                    dest_h
                );
                let _enter = span.enter();

                let jpeg = level
                    .jpeg_at(file_x, file_y)
                    .expect("file grid coordinates derived from level bounds must be in range");

                let offset = (dest_y * w + dest_x) as usize;
                reader::read_region_of_file(
                    jpeg,
                    dest,
                    offset,
                    w as usize,
                    start_in_file_x,
                    start_in_file_y,
                    s,
                    dest_w,
                    dest_h,
                )
                .map_err(|source| RegionError::Decode { file_index, source })?;

                let tile_x = start_in_file_x / jpeg.tile_width;
                let tile_y = start_in_file_y / jpeg.tile_height;
                touched.push(TileKey::new(file_index, tile_x, tile_y, s));
            }

            src_x = origin_x + level.image00_w;
        }
        src_y = origin_y + level.image00_h;
    }

    Ok(touched)
}

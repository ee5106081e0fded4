//! Orchestrates a single random-access decode of one file's sub-rectangle,
//! at a given scale, into the caller's output buffer. See `SPEC_FULL.md`
//! §4.5.

use mozjpeg_sys::J_COLOR_SPACE::JCS_RGB;

use crate::error::DecodeError;
use crate::jpeg::fancy_source::FancySource;
use crate::jpeg::ffi::Decompress;
use crate::model::OneJpeg;

/// Decodes the `w x h` (already scaled) sub-rectangle of `jpeg` starting at
/// pre-scale file coordinates `(x, y)` and writes BGRA pixels into
/// `dest[dest_offset..]`, `dest_stride` words per row.
///
/// `OneJpeg` is shared read-only across requests (§5); this opens its own
/// file handle rather than taking a lock on a shared one, so concurrent
/// reads of the same file never contend.
#[allow(clippy::too_many_arguments)]
pub fn read_region_of_file(
    jpeg: &OneJpeg,
    dest: &mut [u32],
    dest_offset: usize,
    dest_stride: usize,
    x: u32,
    y: u32,
    s: u32,
    w: u32,
    h: u32,
) -> Result<(), DecodeError> {
    let stride_in_tiles = jpeg.width_in_tiles();
    let tile_x = x / jpeg.tile_width;
    let tile_y = y / jpeg.tile_height;

    let width_in_tiles = div_ceil_u32(w * s + x % jpeg.tile_width, jpeg.tile_width)
        .min(stride_in_tiles - tile_x);
    let height_in_tiles =
        div_ceil_u32(h * s + y % jpeg.tile_height, jpeg.tile_height).min(jpeg.height_in_tiles() - tile_y);

    let handle = jpeg.file.try_clone()?;
    let source = FancySource::new(
        handle,
        jpeg.mcu_starts.clone(),
        (tile_y * stride_in_tiles + tile_x) as usize,
        width_in_tiles,
        stride_in_tiles,
    )?;

    let mut decompress = Decompress::new(source)?;
    decompress.set_output_color_space(JCS_RGB);
    decompress.set_scale_denom(s);
    // Lie about dimensions: the decoder only ever sees the chosen tile rows,
    // so constrain it to exactly that sub-image (§4.5 step 4).
    decompress.lie_about_dimensions(width_in_tiles * jpeg.tile_width, height_in_tiles * jpeg.tile_height);

    let mut started = decompress.start()?;
    let output_width = started.output_width() as usize;
    let components = started.output_components();

    let dx = ((x % jpeg.tile_width) / s) as usize;
    let dy = (y % jpeg.tile_height) / s;

    let mut row_buf = vec![0u8; output_width * components];
    for _ in 0..dy {
        if !started.scanlines_remaining() {
            break;
        }
        started.read_scanline(&mut row_buf)?;
    }

    let emit_width = (w as usize).min(output_width.saturating_sub(dx));
    for row in 0..h as usize {
        if !started.scanlines_remaining() {
            tracing::warn!(path = %jpeg.path.display(), row, "decoder ran out of scanlines before requested height");
            break;
        }
        started.read_scanline(&mut row_buf)?;

        let dest_row_start = dest_offset + row * dest_stride;
        for col in 0..emit_width {
            let px = col * components;
            let (r, g, b) = (row_buf[px], row_buf[px + 1], row_buf[px + 2]);
            let pixel = 0xFF00_0000u32 | ((r as u32) << 16) | ((g as u32) << 8) | b as u32;
            dest[dest_row_start + dx + col] = pixel;
        }
    }

    Ok(())
}

fn div_ceil_u32(a: u32, b: u32) -> u32 {
    (a + b - 1) / b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn div_ceil_rounds_up() {
        assert_eq!(div_ceil_u32(1, 4), 1);
        assert_eq!(div_ceil_u32(4, 4), 1);
        assert_eq!(div_ceil_u32(5, 4), 2);
    }
}

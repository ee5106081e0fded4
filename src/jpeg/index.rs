//! Builds a [`crate::model::OneJpeg`] for one file: reads its header, then
//! scans the entropy-coded stream for restart markers to populate
//! `mcu_starts`. See `SPEC_FULL.md` §4.1.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use mozjpeg_sys::J_COLOR_SPACE::JCS_RGB;

use crate::error::FormatError;
use crate::jpeg::fancy_source::FancySource;
use crate::jpeg::ffi::Decompress;
use crate::model::OneJpeg;

fn io_err(path: &Path, source: std::io::Error) -> FormatError {
    FormatError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Indexes one JPEG file: reads its header, then scans raw compressed bytes
/// for restart markers to build the `mcu_starts` offset table.
pub fn index_jpeg(path: &Path) -> Result<OneJpeg, FormatError> {
    let path_str = path.display().to_string();
    let file = File::open(path).map_err(|e| io_err(path, e))?;

    // Header-only pass: an unbounded `FancySource` (empty positions table,
    // "no random access active") so we see the original, unrewritten
    // restart-marker bytes while we hunt for them below.
    let source = FancySource::new(
        file.try_clone().map_err(|e| io_err(path, e))?,
        vec![],
        0,
        0,
        0,
    )
    .map_err(|e| io_err(path, e))?;

    let mut decompress = Decompress::new(source).map_err(|e| FormatError::DecoderInternal {
        path: path_str.clone(),
        message: e.to_string(),
    })?;
    decompress.set_output_color_space(JCS_RGB);
    let header = decompress.header_info();

    if header.restart_interval == 0 {
        return Err(FormatError::ZeroRestartInterval { path: path_str });
    }

    // Each run between restart markers covers `restart_interval` MCUs on one
    // MCU row, giving a horizontal tile band; each MCU row is one vertical
    // tile, so tile_height is just the MCU height.
    let tile_width = header.mcu_width * header.restart_interval as u32;
    let tile_height = header.mcu_height;
    if header.width % tile_width != 0 || header.height % tile_height != 0 {
        return Err(FormatError::NonUniformTiling {
            path: path_str,
            width: header.width,
            height: header.height,
            tile_width,
            tile_height,
        });
    }

    let mcus_per_row = header.width / header.mcu_width;
    let mcu_rows_in_scan = header.height / header.mcu_height;
    let expected_segments = (mcus_per_row as u64 * mcu_rows_in_scan as u64)
        .div_ceil(header.restart_interval as u64) as usize;

    let mcu_starts = scan_restart_markers(path, &file, expected_segments)?;
    if mcu_starts.len() < 2 {
        return Err(FormatError::MissingRestartMarkers { path: path_str });
    }

    tracing::debug!(
        path = %path_str,
        tile_width,
        tile_height,
        restart_segments = mcu_starts.len(),
        "indexed JPEG fragment"
    );

    Ok(OneJpeg {
        file,
        path: path.to_path_buf(),
        width: header.width,
        height: header.height,
        tile_width,
        tile_height,
        mcu_starts,
        restart_interval: header.restart_interval,
        comment: header.comment,
    })
}

/// Scans the raw file bytes (not through the decoder) for `FF Dn` restart
/// markers, recording the byte offset immediately after each one. The byte
/// right after SOS is `mcu_starts[0]`, even though no marker precedes it.
fn scan_restart_markers(path: &Path, file: &File, expected_segments: usize) -> Result<Vec<u64>, FormatError> {
    let mut file = file.try_clone().map_err(|e| io_err(path, e))?;
    let sos_offset = find_sos_end(path, &mut file)?;

    let mut starts = vec![sos_offset];
    file.seek(SeekFrom::Start(sos_offset)).map_err(|e| io_err(path, e))?;

    let mut buf = [0u8; 65536];
    let mut carry_ff = false;
    let mut pos = sos_offset;
    loop {
        let n = file.read(&mut buf).map_err(|e| io_err(path, e))?;
        if n == 0 {
            break;
        }
        let mut i = 0;
        if carry_ff && n > 0 {
            if (0xD0..=0xD7).contains(&buf[0]) {
                starts.push(pos + 1);
            }
            carry_ff = false;
        }
        while i + 1 < n {
            if buf[i] == 0xFF && (0xD0..=0xD7).contains(&buf[i + 1]) {
                starts.push(pos + i as u64 + 2);
                i += 2;
            } else {
                i += 1;
            }
        }
        carry_ff = i < n && buf[i] == 0xFF;
        pos += n as u64;
        if starts.len() > expected_segments {
            break;
        }
    }

    Ok(starts)
}

/// Locates the first byte of entropy-coded data by scanning markers from the
/// start of the file until `FF DA` (SOS), then skipping its length-prefixed
/// scan header.
fn find_sos_end(path: &Path, file: &mut File) -> Result<u64, FormatError> {
    file.seek(SeekFrom::Start(0)).map_err(|e| io_err(path, e))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf).map_err(|e| io_err(path, e))?;

    let mut i = 0;
    while i + 1 < buf.len() {
        if buf[i] != 0xFF {
            i += 1;
            continue;
        }
        let marker = buf[i + 1];
        match marker {
            0x00 | 0xFF => {
                i += 1;
            }
            0xD8 => i += 2, // SOI, no length field
            0xD0..=0xD9 => i += 2,
            0xDA => {
                // SOS: length field covers itself plus the scan header; the
                // entropy-coded segment begins immediately after.
                let len = u16::from_be_bytes([buf[i + 2], buf[i + 3]]) as usize;
                return Ok((i + 2 + len) as u64);
            }
            _ => {
                let len = u16::from_be_bytes([buf[i + 2], buf[i + 3]]) as usize;
                i += 2 + len;
            }
        }
    }
    Err(FormatError::UnsupportedJpegSubset {
        path: path.display().to_string(),
        reason: "no SOS marker found".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_sos_end_skips_headers() {
        // SOI, a one-byte-payload APPn, SOS with a 2-byte header, then data.
        let mut data = vec![0xFF, 0xD8];
        data.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x03, 0xAB]);
        let sos_start = data.len();
        data.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x02]);
        let scan_data_start = data.len();
        data.extend_from_slice(&[0x11, 0x22, 0x33]);

        let mut f = tempfile::tempfile().unwrap();
        use std::io::Write;
        f.write_all(&data).unwrap();
        let path = Path::new("<tempfile>");
        let end = find_sos_end(path, &mut f).unwrap();
        assert_eq!(end, scan_data_start as u64);
        let _ = sos_start;
    }
}

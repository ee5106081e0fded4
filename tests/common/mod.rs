//! Test-only JPEG fixture synthesis and a reference full-file decode path,
//! built on the same `mozjpeg-sys` binding the crate itself uses. Not a
//! public encoding feature of the crate; this exists purely so the
//! integration suite doesn't need binary fixtures checked into the repo.

use std::ffi::c_void;
use std::fs::File;
use std::io::Write;
use std::os::raw::c_ulong;
use std::path::Path;

use mozjpeg_sys::{
    jpeg_CreateCompress, jpeg_compress_struct, jpeg_destroy_compress, jpeg_error_mgr,
    jpeg_finish_compress, jpeg_mem_dest, jpeg_set_defaults, jpeg_set_quality, jpeg_start_compress,
    jpeg_std_error, jpeg_write_scanlines, JPEG_LIB_VERSION,
    J_COLOR_SPACE::JCS_RGB,
};

use mcu_pyramid::jpeg::fancy_source::FancySource;
use mcu_pyramid::jpeg::ffi::Decompress;

/// Encodes `width x height` RGB pixels (row-major, 3 bytes/pixel, no
/// padding) as a baseline JPEG with the given restart interval (in MCUs),
/// and writes it to `path`.
pub fn write_fixture(path: &Path, width: u32, height: u32, restart_interval: u16, rgb: &[u8]) {
    let bytes = encode_rgb_jpeg(width, height, restart_interval, rgb);
    let mut f = File::create(path).unwrap();
    f.write_all(&bytes).unwrap();
}

fn encode_rgb_jpeg(width: u32, height: u32, restart_interval: u16, rgb: &[u8]) -> Vec<u8> {
    unsafe {
        let mut cinfo: jpeg_compress_struct = std::mem::zeroed();
        let mut err: jpeg_error_mgr = std::mem::zeroed();
        jpeg_std_error(&mut err);
        cinfo.err = &mut err;
        jpeg_CreateCompress(&mut cinfo, JPEG_LIB_VERSION, std::mem::size_of::<jpeg_compress_struct>());

        let mut out_buf: *mut u8 = std::ptr::null_mut();
        let mut out_size: c_ulong = 0;
        jpeg_mem_dest(&mut cinfo, &mut out_buf, &mut out_size);

        cinfo.image_width = width;
        cinfo.image_height = height;
        cinfo.input_components = 3;
        cinfo.in_color_space = JCS_RGB;
        jpeg_set_defaults(&mut cinfo);
        // Keep RGB (no YCbCr subsampling) so flat fixture blocks survive
        // quantization essentially untouched.
        cinfo.jpeg_color_space = JCS_RGB;
        jpeg_set_quality(&mut cinfo, 100, 1);
        cinfo.restart_interval = restart_interval as u32;

        jpeg_start_compress(&mut cinfo, 1);
        let row_stride = width as usize * 3;
        while cinfo.next_scanline < cinfo.image_height {
            let row_start = cinfo.next_scanline as usize * row_stride;
            let mut row_ptr = rgb[row_start..row_start + row_stride].as_ptr() as *mut u8;
            jpeg_write_scanlines(&mut cinfo, &mut row_ptr, 1);
        }
        jpeg_finish_compress(&mut cinfo);

        let data = std::slice::from_raw_parts(out_buf, out_size as usize).to_vec();
        libc::free(out_buf as *mut c_void);
        jpeg_destroy_compress(&mut cinfo);
        data
    }
}

/// A solid-color `width x height` fixture, one distinct color per tile-like
/// region so stitching/cropping tests can tell where pixels came from just
/// by color.
pub fn solid_rgb(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let mut out = Vec::with_capacity(width as usize * height as usize * 3);
    for _ in 0..(width * height) {
        out.extend_from_slice(&color);
    }
    out
}

/// A per-pixel gradient, distinguishable at any offset: unlike [`solid_rgb`],
/// a tile-offset or cropping bug shifts the sampled gradient value and so is
/// visible in the decoded output rather than canceling out.
pub fn gradient_rgb(width: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(width as usize * height as usize * 3);
    for y in 0..height {
        for x in 0..width {
            out.extend_from_slice(&[(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8]);
        }
    }
    out
}

/// Decodes an entire JPEG file through the crate's own decoder FFI boundary
/// (not through `mcu_pyramid::reader`), as a standalone reference: no
/// restart-marker rewriting is exercised because `positions` is empty, so
/// this is byte-for-byte what a plain full-file decode produces.
pub fn decode_whole_file_bgra(path: &Path, scale_denom: u32) -> (u32, u32, Vec<u32>) {
    let file = File::open(path).unwrap();
    let source = FancySource::new(file, vec![], 0, 0, 0).unwrap();
    let mut decompress = Decompress::new(source).unwrap();
    decompress.set_output_color_space(JCS_RGB);
    decompress.set_scale_denom(scale_denom);
    let mut started = decompress.start().unwrap();

    let w = started.output_width();
    let h = started.output_height();
    let components = started.output_components();
    let mut row = vec![0u8; w as usize * components];
    let mut out = vec![0u32; (w * h) as usize];

    for y in 0..h as usize {
        started.read_scanline(&mut row).unwrap();
        for x in 0..w as usize {
            let px = x * components;
            let (r, g, b) = (row[px], row[px + 1], row[px + 2]);
            out[y * w as usize + x] = 0xFF00_0000u32 | ((r as u32) << 16) | ((g as u32) << 8) | b as u32;
        }
    }

    (w, h, out)
}

//! Unsafe bridge between [`super::fancy_source::FancySource`] and
//! libjpeg-turbo's decompressor, via raw `mozjpeg-sys` bindings.
//!
//! We use `mozjpeg-sys` rather than the safe `mozjpeg` crate because two
//! things the spec needs are not exposed by the safe wrapper: direct
//! mutation of `cinfo.image_width`/`image_height` after the header has been
//! read (the "lie about dimensions" trick, §4.5), and a fully custom
//! `jpeg_source_mgr` that seeks mid-stream rather than reading one
//! contiguous buffer (§4.2). Both require raw struct access.

use std::io::{Read, Seek};
use std::os::raw::c_int;
use std::panic::{self, AssertUnwindSafe};

use mozjpeg_sys::{
    boolean, j_decompress_ptr, jpeg_CreateDecompress, jpeg_decompress_struct, jpeg_destroy_decompress,
    jpeg_error_mgr, jpeg_marker_struct, jpeg_read_header, jpeg_read_scanlines, jpeg_resync_to_restart,
    jpeg_save_markers, jpeg_source_mgr, jpeg_start_decompress, jpeg_std_error, J_COLOR_SPACE,
    JPEG_LIB_VERSION, JPEG_REACHED_EOI, JPEG_REACHED_SOS,
};

use super::fancy_source::{FancySource, INPUT_BUF_SIZE};
use crate::error::DecodeError;

const FALSE: boolean = 0;
const TRUE: boolean = 1;

/// `COM` marker code, saved via `jpeg_save_markers` so we can read back the
/// per-file comment the spec exposes through `Backend::get_comment`.
const COMMENT_MARKER: c_int = 0xFE;

/// A `jpeg_source_mgr` subclassed (C-style, via `#[repr(C)]` field order) to
/// carry a pointer to the Rust-owned [`FancySource`] driving it.
///
/// Relies on the guarantee that a `#[repr(C)]` struct's address equals its
/// first field's address, so a `*mut jpeg_source_mgr` handed back by libjpeg
/// to one of our callbacks can be cast straight back to `*mut Self`.
#[repr(C)]
struct FancySourceMgr<R> {
    base: jpeg_source_mgr,
    state: *mut FancySource<R>,
    /// Buffer libjpeg is allowed to read directly from; refreshed from
    /// `state`'s own buffer on every `fill_input_buffer` call so we never
    /// need to duplicate `FancySource`'s `INPUT_BUF_SIZE` allocation.
    buf: [u8; INPUT_BUF_SIZE],
}

unsafe extern "C" fn init_source(_cinfo: j_decompress_ptr) {}

unsafe extern "C" fn fill_input_buffer<R: Read + Seek>(cinfo: j_decompress_ptr) -> boolean {
    let mgr = &mut *((*cinfo).src as *mut FancySourceMgr<R>);
    let state = &mut *mgr.state;

    // Never let a panic (or an I/O error treated as fatal) unwind across
    // the C call stack libjpeg runs on top of.
    let result = panic::catch_unwind(AssertUnwindSafe(|| state.fill_buf().map(|b| b.to_vec())));
    let bytes = match result {
        Ok(Ok(bytes)) => bytes,
        _ => return FALSE,
    };
    let n = bytes.len().min(INPUT_BUF_SIZE);
    mgr.buf[..n].copy_from_slice(&bytes[..n]);
    state.consume(n);

    mgr.base.next_input_byte = mgr.buf.as_ptr();
    mgr.base.bytes_in_buffer = n;
    TRUE
}

unsafe extern "C" fn skip_input_data<R: Read + Seek>(cinfo: j_decompress_ptr, num_bytes: i64) {
    if num_bytes <= 0 {
        return;
    }
    let mgr = &mut *((*cinfo).src as *mut FancySourceMgr<R>);
    let have = mgr.base.bytes_in_buffer as i64;
    if num_bytes <= have {
        mgr.base.next_input_byte = mgr.base.next_input_byte.add(num_bytes as usize);
        mgr.base.bytes_in_buffer -= num_bytes as usize;
        return;
    }
    let remaining = (num_bytes - have) as u64;
    mgr.base.bytes_in_buffer = 0;
    let state = &mut *mgr.state;
    let _ = panic::catch_unwind(AssertUnwindSafe(|| state.skip(remaining)));
}

unsafe extern "C" fn term_source(_cinfo: j_decompress_ptr) {}

/// Everything [`super::index`] needs out of the header-only pass before it
/// starts its own raw marker scan.
pub struct HeaderInfo {
    pub width: u32,
    pub height: u32,
    pub mcu_width: u32,
    pub mcu_height: u32,
    pub restart_interval: u16,
    pub comment: Option<String>,
}

/// RAII owner of one `jpeg_decompress_struct` plus the boxed source manager
/// and error manager it points into. Guarantees `jpeg_destroy_decompress` is
/// called exactly once, and that the `FancySource` we boxed up for libjpeg
/// gets dropped along with it.
pub struct Decompress<R> {
    cinfo: jpeg_decompress_struct,
    _err: Box<jpeg_error_mgr>,
    mgr: Box<FancySourceMgr<R>>,
}

impl<R: Read + Seek> Decompress<R> {
    /// Attaches `source` to a freshly created decompressor and reads the
    /// JPEG header (up to SOS). Does not start full decompression.
    pub fn new(source: FancySource<R>) -> Result<Self, DecodeError> {
        unsafe {
            let mut cinfo: jpeg_decompress_struct = std::mem::zeroed();
            let mut err: Box<jpeg_error_mgr> = Box::new(std::mem::zeroed());
            jpeg_std_error(err.as_mut());
            cinfo.err = err.as_mut();
            jpeg_CreateDecompress(
                &mut cinfo,
                JPEG_LIB_VERSION,
                std::mem::size_of::<jpeg_decompress_struct>(),
            );

            let mut mgr: Box<FancySourceMgr<R>> = Box::new(FancySourceMgr {
                base: jpeg_source_mgr {
                    next_input_byte: std::ptr::null(),
                    bytes_in_buffer: 0,
                    init_source: Some(init_source),
                    fill_input_buffer: Some(fill_input_buffer::<R>),
                    skip_input_data: Some(skip_input_data::<R>),
                    resync_to_restart: Some(jpeg_resync_to_restart),
                    term_source: Some(term_source),
                },
                state: Box::into_raw(Box::new(source)),
                buf: [0u8; INPUT_BUF_SIZE],
            });
            cinfo.src = &mut mgr.base;

            // Keep the COM marker around; its payload becomes the published comment.
            jpeg_save_markers(&mut cinfo, COMMENT_MARKER, 0xFFFF);

            let status = jpeg_read_header(&mut cinfo, TRUE);
            if status != JPEG_REACHED_SOS as c_int && status != JPEG_REACHED_EOI as c_int {
                jpeg_destroy_decompress(&mut cinfo);
                drop(Box::from_raw(mgr.state));
                return Err(DecodeError::DecoderInternal {
                    message: format!("jpeg_read_header returned unexpected status {status}"),
                });
            }

            Ok(Self { cinfo, _err: err, mgr })
        }
    }

    pub fn header_info(&mut self) -> HeaderInfo {
        let mcu_width = 8 * self.cinfo.max_h_samp_factor as u32;
        let mcu_height = 8 * self.cinfo.max_v_samp_factor as u32;
        HeaderInfo {
            width: self.cinfo.image_width,
            height: self.cinfo.image_height,
            mcu_width,
            mcu_height,
            restart_interval: self.cinfo.restart_interval,
            comment: self.read_comment(),
        }
    }

    fn read_comment(&self) -> Option<String> {
        unsafe {
            let mut marker = self.cinfo.marker_list;
            while !marker.is_null() {
                let m: &jpeg_marker_struct = &*marker;
                if m.marker as c_int == COMMENT_MARKER {
                    let len = m.data_length as usize;
                    let bytes = std::slice::from_raw_parts(m.data, len);
                    let end = bytes.iter().position(|&b| b == 0).unwrap_or(len);
                    return Some(String::from_utf8_lossy(&bytes[..end]).into_owned());
                }
                marker = m.next;
            }
            None
        }
    }

    /// Applies `scale_denom` (one of `{1, 2, 4, 8}`) using libjpeg's native
    /// DCT scaling: `scale_num / scale_denom == 1 / scale_denom`.
    pub fn set_scale_denom(&mut self, scale_denom: u32) {
        self.cinfo.scale_num = 1;
        self.cinfo.scale_denom = scale_denom;
    }

    pub fn set_output_color_space(&mut self, space: J_COLOR_SPACE) {
        self.cinfo.out_color_space = space;
    }

    /// Overrides `image_width`/`image_height` after header read so the
    /// decoder believes the image ends where our requested window ends,
    /// rather than at the file's true edge ("lie about dimensions", §4.5).
    ///
    /// Must be called after [`Self::new`] and before [`Self::start`].
    pub fn lie_about_dimensions(&mut self, width: u32, height: u32) {
        self.cinfo.image_width = width;
        self.cinfo.image_height = height;
    }

    pub fn start(mut self) -> Result<Started<R>, DecodeError> {
        unsafe {
            if jpeg_start_decompress(&mut self.cinfo) != TRUE {
                return Err(DecodeError::DecoderInternal {
                    message: "jpeg_start_decompress failed".into(),
                });
            }
        }
        Ok(Started { inner: self })
    }
}

impl<R> Drop for Decompress<R> {
    fn drop(&mut self) {
        unsafe {
            jpeg_destroy_decompress(&mut self.cinfo);
            drop(Box::from_raw(self.mgr.state));
        }
    }
}

/// A decompressor past `jpeg_start_decompress`, ready to pull scanlines.
pub struct Started<R> {
    inner: Decompress<R>,
}

impl<R: Read + Seek> Started<R> {
    /// Post-scale width libjpeg actually produced, derived from
    /// `scale_num`/`scale_denom` during `jpeg_start_decompress` — not the
    /// pre-start `image_width` `Decompress::lie_about_dimensions` set.
    pub fn output_width(&self) -> u32 {
        self.inner.cinfo.output_width
    }

    /// Post-scale height; see [`Self::output_width`].
    pub fn output_height(&self) -> u32 {
        self.inner.cinfo.output_height
    }

    pub fn output_components(&self) -> usize {
        self.inner.cinfo.output_components as usize
    }

    /// Reads one scanline into `row`, which must be at least
    /// `output_width() * output_components()` bytes.
    pub fn read_scanline(&mut self, row: &mut [u8]) -> Result<bool, DecodeError> {
        unsafe {
            let mut row_ptr = row.as_mut_ptr();
            let n = jpeg_read_scanlines(&mut self.inner.cinfo, &mut row_ptr, 1);
            if n == 0 && self.inner.cinfo.output_scanline < self.inner.cinfo.output_height {
                return Err(DecodeError::DecoderInternal {
                    message: "jpeg_read_scanlines returned 0 before output_height".into(),
                });
            }
            Ok(n > 0)
        }
    }

    pub fn scanlines_remaining(&self) -> bool {
        self.inner.cinfo.output_scanline < self.inner.cinfo.output_height
    }
}

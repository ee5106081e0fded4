use thiserror::Error;

/// Errors raised while indexing a single JPEG file or building the pyramid.
///
/// These are all setup-time, fatal errors: a `Backend` can never be partially
/// constructed, so any of these aborts the whole `add_jpeg_ops` call.
#[derive(Debug, Error)]
pub enum FormatError {
    /// The file could not be opened or read during setup.
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The JPEG has no restart markers, so MCU-row random access is impossible.
    #[error("{path}: no restart markers found; random access requires restart_interval > 0")]
    MissingRestartMarkers { path: String },

    /// `DRI` specified a restart interval of zero.
    #[error("{path}: restart_interval is 0")]
    ZeroRestartInterval { path: String },

    /// The decoder reported something other than a baseline, non-progressive scan.
    #[error("{path}: unsupported JPEG subset: {reason}")]
    UnsupportedJpegSubset { path: String, reason: String },

    /// `width`/`height` are not exact multiples of `tile_width`/`tile_height`.
    #[error(
        "{path}: dimensions {width}x{height} not a multiple of tile size {tile_width}x{tile_height}"
    )]
    NonUniformTiling {
        path: String,
        width: u32,
        height: u32,
        tile_width: u32,
        tile_height: u32,
    },

    /// The fragment list did not arrive in the required `(z, x, y)` order.
    #[error("fragment order violation: expected successor of {prev:?}, got {got:?}")]
    FragmentOrderViolation {
        prev: (u32, u32, u32),
        got: (u32, u32, u32),
    },

    /// The very first fragment was not `(0, 0, 0)`.
    #[error("first fragment must be (z=0, x=0, y=0), got {got:?}")]
    FirstFragmentNotOrigin { got: (u32, u32, u32) },

    /// A level's file grid has a hole (not every `(x, y)` in `[0..X) x [0..Y)` present).
    #[error("level {level} grid is not dense: expected {expected} fragments, saw {actual}")]
    GridDensityViolation {
        level: u32,
        expected: usize,
        actual: usize,
    },

    /// The decoder's own internal error mechanism fired during setup.
    #[error("decoder error during setup for {path}: {message}")]
    DecoderInternal { path: String, message: String },
}

/// Errors raised while decoding the contents of a region request.
///
/// Per the spec, an out-of-range `level` is *not* an error: `get_dimensions`
/// returns `(0, 0)` and `read_region` silently writes nothing. These variants
/// cover everything that genuinely fails mid-decode.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// A blocking read against the underlying file failed.
    #[error("I/O error during decode: {0}")]
    Io(#[from] std::io::Error),

    /// The decoder's internal error callback fired; the decoder has been destroyed.
    #[error("decoder error: {message}")]
    DecoderInternal { message: String },
}

/// Errors raised by [`crate::backend::Backend::read_region`].
#[derive(Debug, Error)]
pub enum RegionError {
    /// Decoding one of the intersected files failed.
    #[error("failed decoding file #{file_index}: {source}")]
    Decode {
        file_index: usize,
        #[source]
        source: DecodeError,
    },
}

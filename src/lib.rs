//! # mcu-pyramid
//!
//! A random-access reader for whole-slide image pyramids built out of tiled
//! JPEG files whose restart markers are exploited for random access into
//! the entropy-coded stream.
//!
//! The input is a set of independent JPEG fragments, each one stripe or
//! block of a large logical image, grouped into pyramid levels of
//! decreasing resolution. The output is a contiguous raster of 32-bit BGRA
//! pixels covering a caller-requested window.
//!
//! ## Architecture
//!
//! - [`jpeg`] - the custom restart-marker-aware JPEG input source
//!   ([`jpeg::fancy_source`]), the decoder FFI boundary ([`jpeg::ffi`]), and
//!   the per-file restart-marker scan ([`jpeg::index`])
//! - [`pyramid`] - builds the sorted level array from an ordered fragment list
//! - [`router`] - maps a region request across a level's file grid
//! - [`reader`] - decodes one file's sub-rectangle at a given scale
//! - [`backend`] - the public façade tying the above together
//! - [`model`] - shared data types (`Fragment`, `OneJpeg`, `Level`, `TileKey`)
//! - [`config`] - the diagnostic CLI's configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use mcu_pyramid::{Backend, Fragment};
//!
//! let fragments = vec![Fragment::new(0, 0, 0, "slide/0_0_0.jpg")];
//! let backend = Backend::add_jpeg_ops(fragments).expect("valid pyramid");
//! let (w, h) = backend.get_dimensions(0);
//! let mut dest = vec![0u32; (w * h) as usize];
//! backend.read_region(&mut dest, 0, 0, 0, w, h).expect("decode");
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod jpeg;
pub mod model;
pub mod pyramid;
pub mod reader;
pub mod router;

pub use backend::Backend;
pub use config::Config;
pub use error::{DecodeError, FormatError, RegionError};
pub use model::{Fragment, Level, OneJpeg, TileKey};

//! The custom JPEG input source and decoder boundary.
//!
//! `fancy_source` implements the pull-style seek/rewrite state machine of
//! `SPEC_FULL.md` §4.2 against any `Read + Seek`, with no knowledge of the
//! JPEG decoder. `ffi` wraps the black-box decoder (libjpeg-turbo via
//! `mozjpeg-sys`) and bridges it to a `fancy_source::FancySource` through the
//! decoder's C source-manager contract. `index` uses both in header-only mode
//! to build the restart-marker offset table for one file.

pub mod fancy_source;
pub mod ffi;
pub mod index;

pub use fancy_source::{FancySource, INPUT_BUF_SIZE};

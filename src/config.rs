//! Configuration for the diagnostic CLI.
//!
//! This module mirrors the teacher crate's configuration layer in spirit —
//! a `clap::Parser` struct with environment-variable fallbacks and a
//! `validate()` step run before doing any work — scaled down to what a
//! local pyramid-inspection tool actually needs: no S3, no server, no auth.
//!
//! # Environment Variables
//!
//! - `MCU_PYRAMID_DIR` - directory of fragment files (default: positional arg required)
//! - `MCU_PYRAMID_VERBOSE` - enable debug logging

use std::path::PathBuf;

use clap::Parser;

/// mcu-pyramid - inspect and extract regions from a tiled-JPEG pyramid.
///
/// Builds a pyramid from a directory of JPEG fragments named
/// `z_x_y.jpg` and either dumps level metadata or extracts one region to a
/// PNG file.
#[derive(Parser, Debug, Clone)]
#[command(name = "mcu-pyramid")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Directory containing `z_x_y.jpg` fragment files.
    #[arg(env = "MCU_PYRAMID_DIR")]
    pub dir: PathBuf,

    /// If set, extract a region instead of just printing level metadata:
    /// `--extract x,y,level,w,h`.
    #[arg(long, value_parser = parse_region)]
    pub extract: Option<RegionArg>,

    /// Output PNG path for `--extract`.
    #[arg(long, default_value = "region.png")]
    pub out: PathBuf,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long, default_value_t = false, env = "MCU_PYRAMID_VERBOSE")]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct RegionArg {
    pub x: u32,
    pub y: u32,
    pub level: usize,
    pub w: u32,
    pub h: u32,
}

fn parse_region(s: &str) -> Result<RegionArg, String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 5 {
        return Err("expected x,y,level,w,h".to_string());
    }
    let mut nums = [0u64; 5];
    for (slot, part) in nums.iter_mut().zip(parts.iter()) {
        *slot = part
            .trim()
            .parse()
            .map_err(|_| format!("invalid integer: {part}"))?;
    }
    Ok(RegionArg {
        x: nums[0] as u32,
        y: nums[1] as u32,
        level: nums[2] as usize,
        w: nums[3] as u32,
        h: nums[4] as u32,
    })
}

impl Config {
    /// Validates the configuration, returning an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if !self.dir.is_dir() {
            return Err(format!("{} is not a directory", self.dir.display()));
        }
        if let Some(region) = self.extract {
            if region.w == 0 || region.h == 0 {
                return Err("--extract width and height must both be non-zero".to_string());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_region() {
        let r = parse_region("10, 20, 1, 256, 128").unwrap();
        assert_eq!((r.x, r.y, r.level, r.w, r.h), (10, 20, 1, 256, 128));
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert!(parse_region("10,20,1").is_err());
    }

    #[test]
    fn rejects_nonnumeric_field() {
        assert!(parse_region("x,20,1,256,128").is_err());
    }
}

//! mcu-pyramid - diagnostic CLI for tiled-JPEG pyramids.
//!
//! Builds a pyramid from a directory of `z_x_y.jpg` fragment files and
//! either prints level metadata or extracts one region to a PNG file.

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mcu_pyramid::{Backend, Config, Fragment};

fn main() -> ExitCode {
    let config = Config::parse();
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let fragments = match discover_fragments(&config.dir) {
        Ok(f) => f,
        Err(e) => {
            error!("Failed to discover fragments in {}: {}", config.dir.display(), e);
            return ExitCode::FAILURE;
        }
    };
    if fragments.is_empty() {
        error!("No fragment files matching 'z_x_y.jpg' found in {}", config.dir.display());
        return ExitCode::FAILURE;
    }

    info!("Found {} fragment(s); building pyramid...", fragments.len());
    let backend = match Backend::add_jpeg_ops(fragments) {
        Ok(b) => b,
        Err(e) => {
            error!("Failed to build pyramid: {}", e);
            return ExitCode::FAILURE;
        }
    };

    print_levels(&backend);

    if let Some(region) = config.extract {
        match extract_region(&backend, region, &config.out) {
            Ok(()) => info!("Wrote {}", config.out.display()),
            Err(e) => {
                error!("Failed to extract region: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}

fn print_levels(backend: &Backend) {
    info!("");
    info!("level  width   height");
    for level in 0..backend.level_count() {
        let (w, h) = backend.get_dimensions(level);
        info!("{:5}  {:6}  {:6}", level, w, h);
    }
    if let Some(comment) = backend.get_comment() {
        info!("comment: {}", comment);
    }
}

fn extract_region(
    backend: &Backend,
    region: mcu_pyramid::config::RegionArg,
    out: &Path,
) -> Result<(), String> {
    let mut dest = vec![0u32; (region.w as usize) * (region.h as usize)];
    backend
        .read_region(&mut dest, region.x, region.y, region.level, region.w, region.h)
        .map_err(|e| e.to_string())?;

    let mut rgba = Vec::with_capacity(dest.len() * 4);
    for pixel in dest {
        let r = ((pixel >> 16) & 0xFF) as u8;
        let g = ((pixel >> 8) & 0xFF) as u8;
        let b = (pixel & 0xFF) as u8;
        rgba.extend_from_slice(&[r, g, b, 0xFF]);
    }

    image::RgbaImage::from_raw(region.w, region.h, rgba)
        .ok_or_else(|| "region buffer did not match declared dimensions".to_string())?
        .save(out)
        .map_err(|e| e.to_string())
}

/// Finds every `z_x_y.jpg` file in `dir` and returns them sorted in the
/// `(z, x, y)` order the pyramid builder requires.
fn discover_fragments(dir: &Path) -> std::io::Result<Vec<Fragment>> {
    let mut fragments = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let Some((z, x, y)) = parse_fragment_name(stem) else {
            continue;
        };
        fragments.push(Fragment::new(z, x, y, path));
    }
    fragments.sort_by_key(|f| (f.z, f.x, f.y));
    Ok(fragments)
}

fn parse_fragment_name(stem: &str) -> Option<(u32, u32, u32)> {
    let mut parts = stem.split('_');
    let z = parts.next()?.parse().ok()?;
    let x = parts.next()?.parse().ok()?;
    let y = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((z, x, y))
}

fn init_logging(verbose: bool) {
    let env_filter = if verbose { "mcu_pyramid=debug" } else { "mcu_pyramid=info" };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| env_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fragment_names() {
        assert_eq!(parse_fragment_name("0_0_0"), Some((0, 0, 0)));
        assert_eq!(parse_fragment_name("2_3_1"), Some((2, 3, 1)));
    }

    #[test]
    fn rejects_malformed_names() {
        assert_eq!(parse_fragment_name("not_a_fragment_name"), None);
        assert_eq!(parse_fragment_name("0_0"), None);
    }
}

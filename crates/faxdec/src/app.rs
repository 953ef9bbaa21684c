//! Page capture and output
//!
//! Runs the receiver over the input until it is exhausted. Every
//! completed page is optionally rectified and then written as a
//! PNG file named for the time it was completed.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use image::GrayImage;
use log::{debug, info, warn};

use hffax::{FaxEvent, FaxRectifier, FaxReceiver, ImageRectifier, Page};

use crate::cli::{Args, Rectify};

/// Run the application
///
/// Runs the receiver with the given command-line `args`, a
/// fully-initialized `receiver`, and an `input` iterator which
/// returns each `i16` sample from some input source until it is
/// exhausted. Returns the number of pages saved.
pub fn run<I>(args: &Args, receiver: &mut FaxReceiver, input: I) -> Result<usize, anyhow::Error>
where
    I: Iterator<Item = i16>,
{
    let mut saved = 0;
    for evt in receiver.iter(input.map(|sa| sa as f32)) {
        match evt {
            FaxEvent::PageStarted(geom) => {
                info!(
                    "page started: line length {} µs, start of line {} µs",
                    geom.line_length, geom.start_of_line
                );
            }
            FaxEvent::Adjusted(geom) => {
                debug!("page adjusted: line length {} µs", geom.line_length);
            }
            FaxEvent::PageReady(page) => {
                save_page(args, page)?;
                saved += 1;
            }
        }
    }

    // the last page ends with the input
    if let Some(page) = receiver.flush() {
        save_page(args, page)?;
        saved += 1;
    }

    Ok(saved)
}

/// Rectify an existing image file
///
/// The result is saved next to the other pages, with a
/// `-rectified` suffix.
pub fn rectify_file(args: &Args, path: &Path) -> Result<PathBuf, anyhow::Error> {
    let img = image::open(path)
        .with_context(|| format!("Unable to open --image \"{}\"", path.display()))?
        .to_luma8();
    let (width, height) = img.dimensions();
    info!("rectifying {}×{} image \"{}\"", width, height, path.display());

    let mut page = Page::from_raw(width as usize, height as usize, img.into_raw())?;
    let method = match args.rectify {
        Rectify::None => Rectify::Bars,
        other => other,
    };
    rectify(method, &mut page);

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "fax".to_owned());
    let out = args.output_dir.join(format!("{}-rectified.png", stem));
    write_png(&page, &out)?;
    if !args.quiet {
        println!("{}", out.display());
    }
    Ok(out)
}

// Rectify and write one page
fn save_page(args: &Args, mut page: Page) -> Result<PathBuf, anyhow::Error> {
    rectify(args.rectify, &mut page);
    let path = page_path(&args.output_dir, &Utc::now(), |p| p.exists());
    write_png(&page, &path)?;
    if !args.quiet {
        println!("{}", path.display());
    }
    Ok(path)
}

// Rectify a page in place
//
// Failure to rectify is not fatal; the page is kept as received.
fn rectify(method: Rectify, page: &mut Page) {
    match method {
        Rectify::None => {}
        Rectify::Bars => match FaxRectifier::new().rectify(page) {
            Ok(report) => debug!(
                "rectified {} rows, bar length {} px",
                report.rows(),
                report.bar_length
            ),
            Err(err) => warn!("page not rectified: {}", err),
        },
        Rectify::Correlate => {
            let _ = ImageRectifier::new().rectify(page);
        }
    }
}

// Encode a page as PNG
fn write_png(page: &Page, path: &Path) -> Result<(), anyhow::Error> {
    let width = u32::try_from(page.width()).context("page too wide")?;
    let height = u32::try_from(page.height()).context("page too tall")?;
    let img = GrayImage::from_raw(width, height, page.pixels().to_vec())
        .ok_or_else(|| anyhow!("page of {}×{} pixels is malformed", width, height))?;
    img.save(path)
        .with_context(|| format!("Unable to write page \"{}\"", path.display()))?;
    info!("saved page \"{}\"", path.display());
    Ok(())
}

// Output file name for a page completed at `at`
//
// Pages completed within the same second are numbered.
fn page_path<F>(dir: &Path, at: &DateTime<Utc>, taken: F) -> PathBuf
where
    F: Fn(&Path) -> bool,
{
    let stem = at.format("fax-%Y%m%d-%H%M%S").to_string();
    let mut path = dir.join(format!("{}.png", stem));
    let mut n = 1;
    while taken(&path) {
        path = dir.join(format!("{}-{}.png", stem, n));
        n += 1;
    }
    path
}

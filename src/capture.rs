//! Screen capture module
//! Uses `xcap` for cross-platform screenshots; the primary display is the first source.
//! Hides the window around the grab so the assistant does not capture itself.
//! Output is a base64 JPEG ready to drop into an `image_url` data URI.
//! Debug: set `DEBUG_CAPTURE=1` to also write the JPEG to `screenshots/debug_capture.jpg`.

use anyhow::{Context, Result};
use base64::{Engine as _, engine::general_purpose};
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::env;
use std::fs;
use std::io::Cursor;
use std::time::Instant;
use xcap::Monitor;

use crate::error::AssistError;
use crate::window::WindowHost;

/// Longest edge of a source thumbnail, in pixels.
pub const THUMBNAIL_MAX_EDGE: u32 = 1920;

const DEBUG_DIR: &str = "screenshots";
const DEBUG_FILE: &str = "screenshots/debug_capture.jpg";

/// One enumerated screen. Its bitmap is grabbed only when `thumbnail` is called.
pub struct ScreenSource {
    pub name: String,
    grab: Box<dyn FnOnce() -> Result<RgbaImage>>,
}

impl ScreenSource {
    pub fn new<F>(name: impl Into<String>, grab: F) -> Self
    where
        F: FnOnce() -> Result<RgbaImage> + 'static,
    {
        Self { name: name.into(), grab: Box::new(grab) }
    }

    /// Captures the source now.
    pub fn thumbnail(self) -> Result<RgbaImage> {
        (self.grab)()
    }
}

/// Host screen-source enumeration, screen sources only. The first entry is the primary display.
pub trait ScreenSources {
    fn screen_sources(&self) -> Result<Vec<ScreenSource>>;
}

/// Enumerates monitors through `xcap`, primary first.
/// Permissions note: on macOS the terminal needs "Screen & System Audio Recording"
/// in System Settings > Privacy & Security.
pub struct XcapScreens {
    max_edge: u32,
}

impl XcapScreens {
    pub fn new() -> Self {
        Self { max_edge: THUMBNAIL_MAX_EDGE }
    }
}

impl Default for XcapScreens {
    fn default() -> Self {
        Self::new()
    }
}

impl ScreenSources for XcapScreens {
    fn screen_sources(&self) -> Result<Vec<ScreenSource>> {
        let mut monitors = Monitor::all().context("Failed to enumerate monitors")?;
        monitors.sort_by_key(|m| !m.is_primary().unwrap_or(false));

        let max_edge = self.max_edge;
        Ok(monitors
            .into_iter()
            .map(|monitor| {
                let name = monitor.name().unwrap_or_default();
                let label = name.clone();
                ScreenSource::new(name, move || {
                    let raw = monitor.capture_image().with_context(|| {
                        format!(
                            "Failed to capture monitor {label:?}. \
                             On macOS, ensure the terminal has Screen Recording permission"
                        )
                    })?;
                    Ok(fit_within(raw, max_edge))
                })
            })
            .collect())
    }
}

fn fit_within(image: RgbaImage, max_edge: u32) -> RgbaImage {
    if image.width() <= max_edge && image.height() <= max_edge {
        return image;
    }
    DynamicImage::ImageRgba8(image).thumbnail(max_edge, max_edge).to_rgba8()
}

/// Issues the show signal when dropped, so every exit path un-hides the window.
struct ShowOnDrop<'a, W: WindowHost + ?Sized>(&'a W);

impl<W: WindowHost + ?Sized> Drop for ShowOnDrop<'_, W> {
    fn drop(&mut self) {
        self.0.show();
    }
}

/// Hides the window, grabs the primary screen, shows the window again and returns
/// the image as base64 JPEG (no data-URI prefix).
pub fn capture_primary_screen<W, S>(window: &W, sources: &S) -> Result<String, AssistError>
where
    W: WindowHost + ?Sized,
    S: ScreenSources + ?Sized,
{
    let start = Instant::now();

    window.hide();
    let shown = ShowOnDrop(window);

    let primary = sources
        .screen_sources()
        .map_err(capture_error)?
        .into_iter()
        .next()
        .ok_or_else(|| AssistError::Capture("No screen sources found".to_string()))?;
    let name = primary.name.clone();
    let thumbnail = primary.thumbnail().map_err(capture_error)?;

    drop(shown);

    if thumbnail.width() == 0 || thumbnail.height() == 0 {
        return Err(AssistError::Capture(
            "Captured empty screenshot - possible permission issue or no display".to_string(),
        ));
    }

    let (w, h) = thumbnail.dimensions();
    let jpeg = encode_jpeg(thumbnail).map_err(capture_error)?;

    if env::var_os("DEBUG_CAPTURE").is_some() {
        if let Err(e) = save_debug_capture(&jpeg) {
            log::warn!("{e:#}");
        }
    }

    log::debug!(
        "Captured {:?} {}x{} ({} JPEG bytes) in {:?}",
        name,
        w,
        h,
        jpeg.len(),
        start.elapsed()
    );

    Ok(general_purpose::STANDARD.encode(&jpeg))
}

fn capture_error(e: anyhow::Error) -> AssistError {
    AssistError::Capture(format!("{e:#}"))
}

fn encode_jpeg(image: RgbaImage) -> Result<Vec<u8>> {
    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgba8(image).to_rgb8();
    let mut bytes = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(rgb)
        .write_to(&mut bytes, ImageFormat::Jpeg)
        .context("Failed to encode screenshot as JPEG")?;
    Ok(bytes.into_inner())
}

fn save_debug_capture(jpeg: &[u8]) -> Result<()> {
    fs::create_dir_all(DEBUG_DIR).context("Failed to create screenshots/ debug directory")?;
    fs::write(DEBUG_FILE, jpeg).context("Failed to save debug capture to screenshots/")?;
    Ok(())
}

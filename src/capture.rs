//! Screen capture module
//! Takes a full-page screenshot through the `Page` seam and crops it to the
//! review section using the located anchors plus the configured margins.
//! A crop that would be empty falls back to the whole screenshot, so every
//! located target produces an image.
//! Debug: set env var `CAPTURE_DEBUG=1` to also save the full screenshot with
//! the crop rectangle outlined under `{date}/debug/`.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use image::{DynamicImage, GenericImageView, ImageError, Rgba};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::{BottomRule, CropGeometry, NavigationConfig};
use crate::error::{PageError, TargetError};
use crate::locate::Anchors;
use crate::navigate;
use crate::page::Page;

/// Pixel bounds of a crop, `0 <= left < right <= width`, `0 <= top < bottom <= height`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropRegion {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl CropRegion {
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CropPlan {
    Region(CropRegion),
    /// The computed rectangle was empty; keep the whole screenshot.
    FullImage,
}

/// Clamps a document coordinate into `0..=limit`. NaN maps to 0.
fn clamp_px(value: f64, limit: u32) -> u32 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, f64::from(limit)) as u32
}

/// Computes the crop rectangle for a `width` x `height` screenshot.
pub fn plan_crop(width: u32, height: u32, anchors: &Anchors, geometry: &CropGeometry) -> CropPlan {
    let start = anchors.start;
    let end = anchors.end.bounds();

    let left = clamp_px(start.x - f64::from(geometry.margin_left), width);
    let top = clamp_px(start.y - f64::from(geometry.margin_top), height);
    let right = left.saturating_add(geometry.width).min(width);
    let mut bottom = match geometry.bottom {
        BottomRule::FixedHeight(h) => top.saturating_add(h).min(height),
        BottomRule::EndAnchor { padding } => clamp_px(end.bottom() + f64::from(padding), height),
    };
    if bottom.saturating_sub(top) < geometry.min_height {
        bottom = top.saturating_add(geometry.min_height).min(height);
    }

    if right > left && bottom > top {
        CropPlan::Region(CropRegion { left, top, right, bottom })
    } else {
        CropPlan::FullImage
    }
}

pub fn apply_crop(image: &DynamicImage, plan: CropPlan) -> DynamicImage {
    match plan {
        CropPlan::Region(r) => image.crop_imm(r.left, r.top, r.width(), r.height()),
        CropPlan::FullImage => image.clone(),
    }
}

/// Grows the window to the full document height, waits for the relayout,
/// then scrolls to the bottom and back to the top so lazy blocks load.
/// Anchors must be located after this, so element coordinates equal
/// screenshot pixels.
pub async fn expand_to_full_page<P: Page + ?Sized>(
    page: &P,
    width: u32,
    document_height: u32,
    navigation: &NavigationConfig,
) -> Result<(), TargetError> {
    page.set_window_size(width, document_height).await?;
    navigate::wait_ready(page, navigation.ready_timeout(), navigation.poll_interval()).await?;
    page.execute("window.scrollTo(0, document.body.scrollHeight);").await?;
    if navigation.settle_ms > 0 {
        sleep(Duration::from_millis(navigation.settle_ms)).await;
    }
    page.execute("window.scrollTo(0, 0);").await?;
    Ok(())
}

pub async fn screenshot<P: Page + ?Sized>(page: &P) -> Result<DynamicImage, TargetError> {
    let png = page.screenshot_png().await?;
    let image = image::load_from_memory(&png)?;
    if image.dimensions() == (0, 0) {
        return Err(PageError::Script("browser returned an empty screenshot".to_string()).into());
    }
    Ok(image)
}

/// Crops `screenshot` and writes it to `path`. Returns the plan used.
pub fn crop_and_save(
    screenshot: &DynamicImage,
    anchors: &Anchors,
    geometry: &CropGeometry,
    path: &Path,
) -> Result<CropPlan, TargetError> {
    let started = Instant::now();
    let (width, height) = screenshot.dimensions();
    let plan = plan_crop(width, height, anchors, geometry);
    match plan {
        CropPlan::Region(r) => info!(
            "crop region: left={}, top={}, right={}, bottom={}",
            r.left, r.top, r.right, r.bottom
        ),
        CropPlan::FullImage => warn!(
            "crop region is empty for a {}x{} screenshot, keeping the full image",
            width, height
        ),
    }

    let cropped = apply_crop(screenshot, plan);
    let write_err = |source| TargetError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(write_err)?;
    }
    cropped.save(path).map_err(|e| match e {
        ImageError::IoError(source) => write_err(source),
        other => TargetError::Image(other),
    })?;

    if env::var_os("CAPTURE_DEBUG").is_some() {
        if let Err(e) = save_debug_overlay(screenshot, plan, path) {
            warn!("Failed to save debug overlay: {}", e);
        }
    }

    debug!("crop + save latency: {:?}", started.elapsed());
    info!(
        "saved {} ({} x {})",
        path.display(),
        cropped.width(),
        cropped.height()
    );
    Ok(plan)
}

fn debug_path(path: &Path) -> Option<PathBuf> {
    let dir = path.parent()?.join("debug");
    let stem = path.file_stem()?.to_str()?;
    Some(dir.join(format!("{}_full.png", stem)))
}

fn save_debug_overlay(screenshot: &DynamicImage, plan: CropPlan, path: &Path) -> anyhow::Result<()> {
    let target = debug_path(path).ok_or_else(|| anyhow::anyhow!("no debug path for {}", path.display()))?;
    let mut canvas = screenshot.to_rgba8();
    if let CropPlan::Region(r) = plan {
        let outline = Rect::at(r.left as i32, r.top as i32).of_size(r.width(), r.height());
        draw_hollow_rect_mut(&mut canvas, outline, Rgba([255, 0, 0, 255]));
    }
    if let Some(dir) = target.parent() {
        fs::create_dir_all(dir)?;
    }
    canvas.save(&target)?;
    Ok(())
}

//! Browser seam.
//! Everything the navigator, locator and capture steps need from a browser,
//! behind one trait so the pipeline can run against a fixture in tests.

use async_trait::async_trait;
use serde_json::Value;

use crate::config::SelectorSpec;
use crate::error::PageError;

/// Element bounds in document pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

#[async_trait]
pub trait Page: Send + Sync {
    async fn goto(&self, url: &str) -> Result<(), PageError>;

    async fn current_url(&self) -> Result<String, PageError>;

    /// Runs `script` in the page and returns its JSON result.
    async fn execute(&self, script: &str) -> Result<Value, PageError>;

    /// Bounds of the first element matching `selector`, `None` if nothing matches.
    async fn find_box(&self, selector: &SelectorSpec) -> Result<Option<BoundingBox>, PageError>;

    async fn set_window_size(&self, width: u32, height: u32) -> Result<(), PageError>;

    async fn screenshot_png(&self) -> Result<Vec<u8>, PageError>;
}

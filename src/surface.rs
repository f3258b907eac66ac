//! Consumed interfaces onto the live automation surface.
//!
//! The page-state extractor, selector enumerator, and automation executor
//! are external collaborators; this module only defines their ports and the
//! outcome types crossing the executor boundary.

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;

use crate::errors::SynthError;

/// Read-only view of the automation target's current interactive state.
///
/// A snapshot reflects state only at the moment of extraction and is never
/// auto-refreshed mid-step; stale-state false negatives are compensated by
/// the validator's deferral policy.
#[async_trait]
pub trait SurfaceObserver: Send + Sync {
    /// Bounded, script/style-stripped textual snapshot of the surface.
    async fn simplified_snapshot(&self) -> Result<String, SynthError>;

    /// Base64 screenshot of the surface, when the backend supports it.
    async fn screenshot_base64(&self) -> Result<Option<String>, SynthError> {
        Ok(None)
    }

    /// Enumerate selectors currently present on the surface.
    ///
    /// Used only by the failure analyzer to propose durable replacements.
    async fn available_locators(&self) -> Result<Vec<String>, SynthError> {
        Ok(Vec::new())
    }
}

/// Fixed in-memory surface for tests and offline development.
#[derive(Debug, Clone, Default)]
pub struct StaticSurface {
    snapshot: String,
    locators: Vec<String>,
    screenshot: Option<String>,
}

impl StaticSurface {
    pub fn new(snapshot: impl Into<String>) -> Self {
        Self {
            snapshot: snapshot.into(),
            locators: Vec::new(),
            screenshot: None,
        }
    }

    pub fn with_locators(mut self, locators: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.locators = locators.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_screenshot(mut self, screenshot: impl Into<String>) -> Self {
        self.screenshot = Some(screenshot.into());
        self
    }
}

#[async_trait]
impl SurfaceObserver for StaticSurface {
    async fn simplified_snapshot(&self) -> Result<String, SynthError> {
        Ok(self.snapshot.clone())
    }

    async fn screenshot_base64(&self) -> Result<Option<String>, SynthError> {
        Ok(self.screenshot.clone())
    }

    async fn available_locators(&self) -> Result<Vec<String>, SynthError> {
        Ok(self.locators.clone())
    }
}

/// Failure reported by the automation executor for one command sequence.
#[derive(Debug, Clone)]
pub struct ExecutionFailure {
    /// Index of the failing command within the executed sequence, if known.
    pub command_index: Option<usize>,
    /// Executor-supplied error text.
    pub error: String,
}

impl ExecutionFailure {
    pub fn new(command_index: Option<usize>, error: impl Into<String>) -> Self {
        Self {
            command_index,
            error: error.into(),
        }
    }
}

/// Future returned by the caller-supplied execute callback.
pub type ExecuteFuture = Pin<Box<dyn Future<Output = Result<(), ExecutionFailure>> + Send>>;

//! Read-only cached snapshot of the routing engine's running configuration.

use std::sync::Arc;

use crate::engine::EngineExecutor;
use crate::error::EngineError;

/// Wraps an [`EngineExecutor`] and caches its running configuration as an ordered line sequence,
/// refreshed only on demand. `push` invalidates the cache on failure so the next `refresh` is
/// required before the cache is trusted again.
pub struct ConfigView {
    engine: Arc<dyn EngineExecutor>,
    cache: Option<Vec<String>>,
}

impl ConfigView {
    /// Wrap the given engine executor. The cache starts empty; call [`Self::refresh`] before
    /// reading.
    pub fn new(engine: Arc<dyn EngineExecutor>) -> Self {
        Self {
            engine,
            cache: None,
        }
    }

    /// Pull the full running configuration and cache it.
    pub async fn refresh(&mut self) -> Result<(), EngineError> {
        self.cache = Some(self.engine.text().await?);
        Ok(())
    }

    /// Yield the cached lines, in order. Panics if [`Self::refresh`] has never succeeded; callers
    /// in this crate always refresh immediately before reading.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.cache
            .as_deref()
            .expect("ConfigView::lines called before a successful refresh")
            .iter()
            .map(String::as_str)
    }

    /// Send the command batch to the engine transactionally. On failure the cache is invalidated;
    /// the next `refresh` is required before this view can be trusted again.
    pub async fn push(&mut self, commands: &[String]) -> Result<bool, EngineError> {
        let ok = self.engine.push(commands).await?;
        if !ok {
            self.cache = None;
        }
        Ok(ok)
    }

    /// Run an arbitrary engine command, e.g. the peer soft-reload.
    pub async fn run_command(&self, argv: &[&str]) -> Result<(bool, String, String), EngineError> {
        self.engine.run_command(argv).await
    }
}

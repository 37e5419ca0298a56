//! A logger that buffers formatted records in memory so harnesses can
//! collect the messages produced by a stretch of simulated time and fold
//! them into their own reporting.
//!
//! Calling [`LoggerBuilder::init`] more than once is a no-op, so tests can
//! initialize unconditionally.

use std::sync::{Arc, RwLock};

use log::LevelFilter;

lazy_static::lazy_static! {
    static ref LOG_BUFFER: Arc<RwLock<Vec<String>>> = Arc::new(RwLock::new(Vec::new()));
    static ref BUFFER_INITIALIZED: Arc<RwLock<bool>> = Arc::new(RwLock::new(false));
}

/// Builds the buffering logger.
pub struct LoggerBuilder {
    level: LevelFilter,
    target: Option<String>,
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self {
            level: LevelFilter::Warn,
            target: Some(String::from(env!("CARGO_PKG_NAME"))),
        }
    }
}

impl LoggerBuilder {
    /// Sets the level filter.
    #[must_use]
    pub fn level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self
    }

    /// Restricts buffering to records whose target starts with `target`;
    /// pass `None` to keep everything.
    #[must_use]
    pub fn target<S: Into<String>>(mut self, target: Option<S>) -> Self {
        self.target = target.map(Into::into);
        self
    }

    /// Installs the logger.
    ///
    /// # Errors
    ///
    /// Returns an error when another crate already installed a different
    /// global logger.
    pub fn init(self) -> Result<(), fern::InitError> {
        let mut initialized = BUFFER_INITIALIZED.write().expect("poisoned lock");
        if *initialized {
            return Ok(());
        }
        let buffer = Arc::clone(&LOG_BUFFER);
        let mut dispatch = fern::Dispatch::new()
            .level(self.level)
            .chain(fern::Output::call(move |record| {
                buffer.write().expect("poisoned lock").push(format!(
                    "{:7} {}",
                    format!("[{}]", record.level()),
                    record.args()
                ));
            }));
        if let Some(target) = self.target {
            dispatch = dispatch.filter(move |metadata| metadata.target().starts_with(&target));
        }
        dispatch.apply()?;
        *initialized = true;
        Ok(())
    }
}

/// Clears the buffer and returns its contents.
#[must_use]
pub fn drain() -> Vec<String> {
    LOG_BUFFER
        .write()
        .expect("poisoned lock")
        .drain(..)
        .collect()
}

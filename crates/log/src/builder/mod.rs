//! Logger builder implementation
//!
//! - `format`: format layer creation macros
//! - `reload`: runtime filter reload logic

#[macro_use]
mod format;
mod reload;

pub use reload::ReloadHandle;

use tracing_subscriber::{
    EnvFilter, Registry, fmt::writer::BoxMakeWriter, layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::config::{Config, Format};
use crate::error::{LogError, LogResult};
use crate::writer;
use reload::FilterLayer;

/// Logger builder
#[derive(Debug)]
pub struct LoggerBuilder {
    config: Config,
}

/// Guard that keeps the logger alive
///
/// Holds the reload handle and the root span carrying global fields. Dropping
/// the guard exits the root span; the global subscriber itself stays installed.
pub struct LoggerGuard {
    inner: Option<Box<Inner>>,
}

struct Inner {
    reload_handle: Option<ReloadHandle>,
    root_span: Option<tracing::span::EnteredSpan>,
}

impl LoggerBuilder {
    /// Create builder from config
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// Override the level filter
    #[must_use]
    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.config.level = level.into();
        self
    }

    /// Override the output format
    #[must_use]
    pub fn format(mut self, format: Format) -> Self {
        self.config.format = format;
        self
    }

    /// Build and install the global subscriber
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Filter string cannot be parsed
    /// - Writer configuration is invalid
    /// - A global subscriber is already installed
    pub fn build(self) -> LogResult<LoggerGuard> {
        let filter = EnvFilter::try_new(&self.config.level)
            .map_err(|e| LogError::filter(&self.config.level, e.to_string()))?;

        let writer = writer::make_writer(&self.config.writer)?;

        let (filter_layer, reload_handle) =
            reload::create_filter_layer(filter, &self.config.level, self.config.reloadable);

        match self.config.format {
            Format::Pretty => self.install_pretty(filter_layer, writer)?,
            Format::Compact | Format::Logfmt => self.install_compact(filter_layer, writer)?,
            Format::Json => self.install_json(filter_layer, writer)?,
        }

        let fields = &self.config.fields;
        let root_span = (!fields.is_empty()).then(|| {
            tracing::info_span!(
                "app",
                service = fields.service.as_deref().unwrap_or(""),
                env = fields.env.as_deref().unwrap_or(""),
                version = fields.version.as_deref().unwrap_or(""),
                custom = %fields.custom_summary(),
            )
            .entered()
        });

        Ok(LoggerGuard {
            inner: Some(Box::new(Inner {
                reload_handle,
                root_span,
            })),
        })
    }

    fn install_pretty(&self, filter_layer: FilterLayer, writer: BoxMakeWriter) -> LogResult<()> {
        let fmt_layer = create_fmt_layer!(pretty, &self.config.display, writer);
        Registry::default()
            .with(filter_layer)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| LogError::Init(e.to_string()))
    }

    fn install_compact(&self, filter_layer: FilterLayer, writer: BoxMakeWriter) -> LogResult<()> {
        let fmt_layer = create_fmt_layer!(compact, &self.config.display, writer);
        Registry::default()
            .with(filter_layer)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| LogError::Init(e.to_string()))
    }

    fn install_json(&self, filter_layer: FilterLayer, writer: BoxMakeWriter) -> LogResult<()> {
        let fmt_layer = create_json_layer!(&self.config.display, writer);
        Registry::default()
            .with(filter_layer)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| LogError::Init(e.to_string()))
    }
}

impl LoggerGuard {
    pub(crate) fn noop() -> Self {
        Self { inner: None }
    }

    /// Reload handle, present when the config was `reloadable`
    pub fn reload_handle(&self) -> Option<&ReloadHandle> {
        self.inner.as_ref()?.reload_handle.as_ref()
    }

    /// Whether this guard owns a subscriber it installed
    pub fn is_active(&self) -> bool {
        self.inner.is_some()
    }
}

impl std::fmt::Debug for LoggerGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggerGuard")
            .field("active", &self.is_active())
            .field(
                "root_span",
                &self.inner.as_ref().is_some_and(|i| i.root_span.is_some()),
            )
            .finish()
    }
}

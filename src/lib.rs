//! hbload - Handlebars template module loader
//!
//! Implements the two-phase loader-plugin contract for Handlebars
//! templates: at runtime, `load` fetches template source, compiles it,
//! and registers underscore-prefixed modules as partials; during a build
//! pass it additionally records a precompiled envelope so `write` can
//! later emit a self-contained `define(...)` wrapper module per template.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use hbload::{HbPlugin, LoaderPlugin, PluginConfig, StringSink};
//! use hbload::fetch::{FileFetcher, IdentityResolver};
//!
//! let plugin = HbPlugin::new(Arc::new(FileFetcher::new("templates")));
//! plugin.load("widgets/button", &IdentityResolver, Box::new(|t| {
//!     let html = t.render(&serde_json::json!({"title": "hi"})).unwrap();
//!     println!("{}", html);
//! }), &PluginConfig::build()).await?;
//!
//! let mut sink = StringSink::new();
//! plugin.write("hb", "widgets/button", &mut sink)?;
//! ```

pub mod buildmap;
pub mod cli;
pub mod codegen;
pub mod config;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod partials;
pub mod plugin;

pub use buildmap::BuildMap;
pub use engine::{CompiledTemplate, Precompiled, TemplateEngine};
pub use error::{EngineError, FetchError, LoadError, WriteError};
pub use plugin::{
    FileSink, HbPlugin, LoadMode, LoaderPlugin, ModuleSink, OnLoad, PluginConfig, StringSink, TemplateExtension,
};

/// Plugin id used as the prefix in emitted module ids
pub const DEFAULT_PLUGIN_NAME: &str = "hb";

/// Suffix appended to module names before fetching
pub const DEFAULT_TEMPLATE_EXTENSION: &str = ".tpl";

/// Default HTTP fetch timeout (30s)
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 30_000;

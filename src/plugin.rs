//! Loader plugin protocol
//!
//! [`LoaderPlugin`] mirrors the two-phase loader contract: `load` resolves
//! and compiles a template at runtime, `write` replays a recorded build
//! entry as an emitted module. [`HbPlugin`] is the Handlebars
//! implementation; resolver, fetcher, and sink are all injected so hosts
//! and tests can swap transports without touching the plugin.

use std::fmt;
use std::fs;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::buildmap::BuildMap;
use crate::codegen;
use crate::engine::{CompiledTemplate, TemplateEngine};
use crate::error::{LoadError, WriteError};
use crate::fetch::{TextFetcher, UrlResolver};
use crate::partials;

/// Whether a load happens for immediate use or as part of a build pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadMode {
    #[default]
    Runtime,
    Build,
}

impl LoadMode {
    pub fn is_build(&self) -> bool {
        matches!(self, Self::Build)
    }
}

/// Suffix appended to module names before fetching. `None` is distinct
/// from the default: it disables suffixing entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateExtension {
    Suffix(String),
    None,
}

impl Default for TemplateExtension {
    fn default() -> Self {
        Self::Suffix(crate::DEFAULT_TEMPLATE_EXTENSION.to_string())
    }
}

impl TemplateExtension {
    pub fn apply(&self, module: &str) -> String {
        match self {
            Self::Suffix(suffix) => format!("{}{}", module, suffix),
            Self::None => module.to_string(),
        }
    }
}

mod extension_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::TemplateExtension;

    pub fn serialize<S: Serializer>(ext: &TemplateExtension, serializer: S) -> Result<S::Ok, S::Error> {
        match ext {
            TemplateExtension::Suffix(suffix) => serializer.serialize_some(suffix),
            TemplateExtension::None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TemplateExtension, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(match raw {
            Some(suffix) => TemplateExtension::Suffix(suffix),
            None => TemplateExtension::None,
        })
    }
}

/// Handlebars-specific plugin options. An absent `template-extension`
/// key falls back to `.tpl`; an explicit `null` disables suffixing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HbConfig {
    #[serde(
        rename = "template-extension",
        alias = "templateExtension",
        with = "extension_serde"
    )]
    pub template_extension: TemplateExtension,
}

impl Default for HbConfig {
    fn default() -> Self {
        Self {
            template_extension: TemplateExtension::default(),
        }
    }
}

/// Options passed to every `load` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    pub mode: LoadMode,
    pub hb: HbConfig,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            mode: LoadMode::default(),
            hb: HbConfig::default(),
        }
    }
}

impl PluginConfig {
    pub fn runtime() -> Self {
        Self::default()
    }

    pub fn build() -> Self {
        Self {
            mode: LoadMode::Build,
            ..Self::default()
        }
    }
}

/// Completion callback handed to `load`. Consumed on success, never
/// invoked on failure.
pub type OnLoad = Box<dyn FnOnce(CompiledTemplate) + Send>;

/// Destination for emitted module source
pub trait ModuleSink: Send {
    fn emit(&mut self, module_source: &str) -> Result<(), WriteError>;
}

/// Collects emitted modules in memory
#[derive(Debug, Default)]
pub struct StringSink {
    modules: Vec<String>,
}

impl StringSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    pub fn emit_count(&self) -> usize {
        self.modules.len()
    }
}

impl ModuleSink for StringSink {
    fn emit(&mut self, module_source: &str) -> Result<(), WriteError> {
        self.modules.push(module_source.to_string());
        Ok(())
    }
}

/// Appends emitted modules to a single bundle file. The first emit
/// truncates any previous bundle at that path.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    wrote: bool,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            wrote: false,
        }
    }

    /// True once at least one module has been emitted
    pub fn wrote(&self) -> bool {
        self.wrote
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl ModuleSink for FileSink {
    fn emit(&mut self, module_source: &str) -> Result<(), WriteError> {
        debug!(path = %self.path.display(), "FileSink::emit: called");
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        if self.wrote {
            let mut file = fs::OpenOptions::new().append(true).open(&self.path)?;
            file.write_all(module_source.as_bytes())?;
        } else {
            fs::write(&self.path, module_source)?;
            self.wrote = true;
        }
        Ok(())
    }
}

/// Two-phase loader contract
#[async_trait]
pub trait LoaderPlugin: Send + Sync {
    /// Plugin id used as the prefix in emitted module ids
    fn name(&self) -> &str;

    /// Fetch, compile, and register `module`, then hand the compiled
    /// template to `on_load`
    async fn load(
        &self,
        module: &str,
        resolver: &dyn UrlResolver,
        on_load: OnLoad,
        config: &PluginConfig,
    ) -> Result<(), LoadError>;

    /// Emit the wrapper module recorded for `module` during a build
    /// pass. A module with no recorded entry is skipped.
    fn write(&self, plugin_name: &str, module: &str, sink: &mut dyn ModuleSink) -> Result<(), WriteError>;
}

/// Handlebars loader plugin
pub struct HbPlugin {
    engine: TemplateEngine,
    fetcher: Arc<dyn TextFetcher>,
    build_map: Arc<BuildMap>,
}

impl HbPlugin {
    pub fn new(fetcher: Arc<dyn TextFetcher>) -> Self {
        Self::with_engine(TemplateEngine::new(), fetcher)
    }

    pub fn with_engine(engine: TemplateEngine, fetcher: Arc<dyn TextFetcher>) -> Self {
        debug!("HbPlugin::with_engine: called");
        Self {
            engine,
            fetcher,
            build_map: Arc::new(BuildMap::new()),
        }
    }

    pub fn engine(&self) -> &TemplateEngine {
        &self.engine
    }

    pub fn build_map(&self) -> &BuildMap {
        &self.build_map
    }
}

impl fmt::Debug for HbPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HbPlugin")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl LoaderPlugin for HbPlugin {
    fn name(&self) -> &str {
        crate::DEFAULT_PLUGIN_NAME
    }

    async fn load(
        &self,
        module: &str,
        resolver: &dyn UrlResolver,
        on_load: OnLoad,
        config: &PluginConfig,
    ) -> Result<(), LoadError> {
        debug!(%module, mode = ?config.mode, "HbPlugin::load: called");

        let fetch_name = config.hb.template_extension.apply(module);
        let url = resolver.to_url(&fetch_name);
        let source = self.fetcher.fetch_text(&url).await?;
        debug!(%module, source_len = source.len(), "HbPlugin::load: template fetched");

        if config.mode.is_build() {
            let envelope = self.engine.precompile(module, &source)?;
            self.build_map.insert(module, envelope);
        }

        let compiled = self.engine.compile(module, &source)?;

        if let Some(partial) = partials::partial_name(module) {
            debug!(%module, %partial, "HbPlugin::load: registering partial alias");
            self.engine.alias_template(module, &partial)?;
        }

        on_load(compiled);
        Ok(())
    }

    fn write(&self, plugin_name: &str, module: &str, sink: &mut dyn ModuleSink) -> Result<(), WriteError> {
        let Some(envelope) = self.build_map.get(module) else {
            debug!(%module, "HbPlugin::write: no recorded entry, skipping");
            return Ok(());
        };
        let rendered = codegen::render_module(plugin_name, module, &envelope)?;
        sink.emit(&rendered)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::error::FetchError;
    use crate::fetch::{IdentityResolver, MapFetcher};

    fn plugin_with(entries: &[(&str, &str)]) -> HbPlugin {
        let mut fetcher = MapFetcher::new();
        for &(name, source) in entries {
            fetcher.insert(name, source);
        }
        HbPlugin::new(Arc::new(fetcher))
    }

    fn discard() -> OnLoad {
        Box::new(|_| {})
    }

    #[test]
    fn test_plugin_name() {
        let plugin = plugin_with(&[]);
        assert_eq!(plugin.name(), "hb");
    }

    #[tokio::test]
    async fn test_load_applies_default_extension() {
        let plugin = plugin_with(&[("widgets/button.tpl", "<p>{{title}}</p>")]);
        let config = PluginConfig::runtime();

        let result = plugin.load("widgets/button", &IdentityResolver, discard(), &config).await;

        assert!(result.is_ok());
        assert!(plugin.engine().has_template("widgets/button"));
    }

    #[tokio::test]
    async fn test_load_applies_custom_extension() {
        let plugin = plugin_with(&[("widgets/button.hbs", "<p>{{title}}</p>")]);
        let mut config = PluginConfig::runtime();
        config.hb.template_extension = TemplateExtension::Suffix(".hbs".to_string());

        let result = plugin.load("widgets/button", &IdentityResolver, discard(), &config).await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_load_null_extension_fetches_unmodified() {
        let plugin = plugin_with(&[("widgets/button", "<p>{{title}}</p>")]);
        let mut config = PluginConfig::runtime();
        config.hb.template_extension = TemplateExtension::None;

        let result = plugin.load("widgets/button", &IdentityResolver, discard(), &config).await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_on_load_called_exactly_once_with_renderable_template() {
        let plugin = plugin_with(&[("a/b.tpl", "<p>{{title}}</p>")]);
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let on_load: OnLoad = Box::new(move |template| {
            seen.fetch_add(1, Ordering::SeqCst);
            assert_eq!(template.module(), "a/b");
            let html = template.render(&json!({"title": "hi"})).unwrap();
            assert_eq!(html, "<p>hi</p>");
        });

        plugin.load("a/b", &IdentityResolver, on_load, &PluginConfig::runtime()).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_propagates_without_on_load() {
        let plugin = plugin_with(&[]);
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let on_load: OnLoad = Box::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let result = plugin.load("missing", &IdentityResolver, on_load, &PluginConfig::runtime()).await;

        match result {
            Err(LoadError::Fetch(e)) => assert!(e.is_not_found()),
            other => panic!("Expected fetch error, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_compile_failure_propagates_without_on_load() {
        let plugin = plugin_with(&[("bad.tpl", "{{#if flag}}no closing tag")]);
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let on_load: OnLoad = Box::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let result = plugin.load("bad", &IdentityResolver, on_load, &PluginConfig::runtime()).await;

        assert!(matches!(result, Err(LoadError::Engine(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_build_mode_records_precompiled_entry() {
        let plugin = plugin_with(&[("a/b.tpl", "<p>{{title}}</p>")]);

        plugin.load("a/b", &IdentityResolver, discard(), &PluginConfig::build()).await.unwrap();

        let envelope = plugin.build_map().get("a/b").unwrap();
        assert_eq!(envelope.module, "a/b");
        assert_eq!(envelope.source, "<p>{{title}}</p>");
    }

    #[tokio::test]
    async fn test_runtime_mode_skips_build_map() {
        let plugin = plugin_with(&[("a/b.tpl", "<p>{{title}}</p>")]);

        plugin.load("a/b", &IdentityResolver, discard(), &PluginConfig::runtime()).await.unwrap();

        assert!(plugin.build_map().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_template_leaves_build_map_unpopulated() {
        let plugin = plugin_with(&[("bad.tpl", "{{#each items}}")]);

        let result = plugin.load("bad", &IdentityResolver, discard(), &PluginConfig::build()).await;

        assert!(result.is_err());
        assert!(plugin.build_map().is_empty());
    }

    #[tokio::test]
    async fn test_load_partial_registers_alias() {
        let plugin = plugin_with(&[("partials/_item.tpl", "<li>{{name}}</li>")]);

        plugin
            .load("partials/_item", &IdentityResolver, discard(), &PluginConfig::runtime())
            .await
            .unwrap();

        assert!(plugin.engine().has_template("item"));

        plugin
            .engine()
            .compile("page", "<ul>{{#each items}}{{> item}}{{/each}}</ul>")
            .unwrap();
        let html = plugin
            .engine()
            .render("page", &json!({"items": [{"name": "a"}, {"name": "b"}]}))
            .unwrap();
        assert_eq!(html, "<ul><li>a</li><li>b</li></ul>");
    }

    #[tokio::test]
    async fn test_non_partial_registers_no_alias() {
        let plugin = plugin_with(&[("widgets/button.tpl", "<p>{{title}}</p>")]);

        plugin
            .load("widgets/button", &IdentityResolver, discard(), &PluginConfig::runtime())
            .await
            .unwrap();

        assert!(!plugin.engine().has_template("button"));
    }

    #[test]
    fn test_write_without_entry_is_noop() {
        let plugin = plugin_with(&[]);
        let mut sink = StringSink::new();

        plugin.write("hb", "never/loaded", &mut sink).unwrap();

        assert_eq!(sink.emit_count(), 0);
    }

    #[tokio::test]
    async fn test_write_emits_recorded_module_exactly_once() {
        let plugin = plugin_with(&[("a/b.tpl", "<p>{{title}}</p>")]);
        plugin.load("a/b", &IdentityResolver, discard(), &PluginConfig::build()).await.unwrap();

        let mut sink = StringSink::new();
        plugin.write("hb", "a/b", &mut sink).unwrap();

        assert_eq!(sink.emit_count(), 1);
        assert!(sink.modules()[0].contains("define(\"hb!a/b\""));
    }

    #[tokio::test]
    async fn test_write_rejects_bad_plugin_name() {
        let plugin = plugin_with(&[("a/b.tpl", "<p>{{title}}</p>")]);
        plugin.load("a/b", &IdentityResolver, discard(), &PluginConfig::build()).await.unwrap();

        let mut sink = StringSink::new();
        let result = plugin.write("h b!", "a/b", &mut sink);

        assert!(matches!(result, Err(WriteError::InvalidPluginName { .. })));
        assert_eq!(sink.emit_count(), 0);
    }

    #[test]
    fn test_extension_apply() {
        let default = TemplateExtension::default();
        assert_eq!(default.apply("widgets/button"), "widgets/button.tpl");

        let custom = TemplateExtension::Suffix(".hbs".to_string());
        assert_eq!(custom.apply("widgets/button"), "widgets/button.hbs");

        assert_eq!(TemplateExtension::None.apply("widgets/button"), "widgets/button");
    }

    #[test]
    fn test_plugin_config_defaults() {
        let config: PluginConfig = serde_yaml::from_str("{}").unwrap();

        assert_eq!(config.mode, LoadMode::Runtime);
        assert_eq!(
            config.hb.template_extension,
            TemplateExtension::Suffix(".tpl".to_string())
        );
    }

    #[test]
    fn test_plugin_config_null_extension() {
        let yaml = "mode: build\nhb:\n  template-extension: null\n";
        let config: PluginConfig = serde_yaml::from_str(yaml).unwrap();

        assert!(config.mode.is_build());
        assert_eq!(config.hb.template_extension, TemplateExtension::None);
    }

    #[test]
    fn test_plugin_config_accepts_camel_case_alias() {
        let yaml = "hb:\n  templateExtension: \".hbs\"\n";
        let config: PluginConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(
            config.hb.template_extension,
            TemplateExtension::Suffix(".hbs".to_string())
        );
    }

    #[test]
    fn test_plugin_config_round_trips() {
        let mut config = PluginConfig::build();
        config.hb.template_extension = TemplateExtension::None;

        let yaml = serde_yaml::to_string(&config).unwrap();
        let back: PluginConfig = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(back, config);
    }

    #[test]
    fn test_string_sink_collects_in_order() {
        let mut sink = StringSink::new();
        sink.emit("first").unwrap();
        sink.emit("second").unwrap();

        assert_eq!(sink.modules(), ["first", "second"]);
    }

    #[test]
    fn test_file_sink_appends_across_emits() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("bundle.js");
        let mut sink = FileSink::new(&path);
        assert!(!sink.wrote());

        sink.emit("first\n").unwrap();
        sink.emit("second\n").unwrap();

        assert!(sink.wrote());
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "first\nsecond\n");
    }

    #[test]
    fn test_file_sink_truncates_previous_bundle() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bundle.js");
        fs::write(&path, "stale").unwrap();

        let mut sink = FileSink::new(&path);
        sink.emit("fresh\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "fresh\n");
    }

    #[test]
    fn test_fetch_error_kind_helper() {
        let err = FetchError::NotFound {
            resource: "x".to_string(),
        };
        assert!(err.is_not_found());
    }
}

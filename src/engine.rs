//! Template engine wrapper
//!
//! Wraps a shared Handlebars registry with the three capabilities the
//! loader needs: live compilation for immediate rendering, portable
//! precompiled envelopes for build output, and reconstruction of
//! envelopes back into live templates.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use handlebars::Handlebars;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EngineError;

/// Envelope format version; bump when the shape below changes
pub const ENVELOPE_VERSION: u32 = 1;

/// Portable precompiled representation of one template
///
/// Serialized as JSON, which is also valid JS expression syntax, so the
/// textual form embeds directly into emitted modules. The checksum is
/// verified before reconstruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Precompiled {
    pub version: u32,
    pub module: String,
    pub source: String,
    pub checksum: String,
}

impl Precompiled {
    /// Textual form for embedding into generated modules
    pub fn to_embedded(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse an embedded textual form back into an envelope
    pub fn from_embedded(text: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Shared-registry Handlebars engine
///
/// Each instance owns its own template and partial registry; inject one
/// instance per plugin so runs stay isolated.
#[derive(Clone)]
pub struct TemplateEngine {
    hbs: Arc<RwLock<Handlebars<'static>>>,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self {
            hbs: Arc::new(RwLock::new(Handlebars::new())),
        }
    }
}

impl TemplateEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Handlebars<'static>> {
        self.hbs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Handlebars<'static>> {
        self.hbs.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Parse and register a template, returning a live handle
    pub fn compile(&self, module: &str, source: &str) -> Result<CompiledTemplate, EngineError> {
        debug!(%module, "TemplateEngine::compile: called");
        self.write().register_template_string(module, source)?;
        Ok(CompiledTemplate {
            module: module.to_string(),
            hbs: Arc::clone(&self.hbs),
        })
    }

    /// Register an already-compiled template under a second name.
    /// Re-registration under an existing name overwrites silently.
    pub fn alias_template(&self, from: &str, to: &str) -> Result<(), EngineError> {
        debug!(%from, %to, "TemplateEngine::alias_template: called");
        let mut hbs = self.write();
        let template = hbs
            .get_template(from)
            .cloned()
            .ok_or_else(|| EngineError::NotRegistered { name: from.to_string() })?;
        hbs.register_template(to, template);
        Ok(())
    }

    /// Syntax-check a source and produce its portable envelope without
    /// touching the shared registry
    pub fn precompile(&self, module: &str, source: &str) -> Result<Precompiled, EngineError> {
        debug!(%module, "TemplateEngine::precompile: called");
        let mut scratch = Handlebars::new();
        scratch.register_template_string(module, source)?;
        Ok(Precompiled {
            version: ENVELOPE_VERSION,
            module: module.to_string(),
            source: source.to_string(),
            checksum: checksum(source),
        })
    }

    /// Verify an envelope and register its template, returning a live handle
    pub fn reconstruct(&self, envelope: &Precompiled) -> Result<CompiledTemplate, EngineError> {
        debug!(module = %envelope.module, version = envelope.version, "TemplateEngine::reconstruct: called");
        if envelope.version != ENVELOPE_VERSION {
            return Err(EngineError::UnsupportedVersion {
                found: envelope.version,
                supported: ENVELOPE_VERSION,
            });
        }

        let actual = checksum(&envelope.source);
        if actual != envelope.checksum {
            return Err(EngineError::ChecksumMismatch {
                module: envelope.module.clone(),
                expected: envelope.checksum.clone(),
                actual,
            });
        }

        self.compile(&envelope.module, &envelope.source)
    }

    /// Check whether a template (or partial alias) is registered
    pub fn has_template(&self, name: &str) -> bool {
        self.read().get_template(name).is_some()
    }

    /// Render a registered template by name
    pub fn render<T: Serialize>(&self, name: &str, data: &T) -> Result<String, EngineError> {
        if !self.has_template(name) {
            return Err(EngineError::NotRegistered { name: name.to_string() });
        }
        Ok(self.read().render(name, data)?)
    }
}

impl fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateEngine").finish_non_exhaustive()
    }
}

fn checksum(source: &str) -> String {
    blake3::hash(source.as_bytes()).to_hex().to_string()
}

/// Live handle to a compiled template; renders against the registry it
/// was compiled into, so partial references resolve
#[derive(Clone)]
pub struct CompiledTemplate {
    module: String,
    hbs: Arc<RwLock<Handlebars<'static>>>,
}

impl CompiledTemplate {
    /// Module path the template is registered under
    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn render<T: Serialize>(&self, data: &T) -> Result<String, EngineError> {
        let hbs = self.hbs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(hbs.render(&self.module, data)?)
    }
}

impl fmt::Debug for CompiledTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledTemplate").field("module", &self.module).finish()
    }
}

//! Loader-module code generation
//!
//! The write phase emits one wrapper module per recorded template. The
//! module skeleton is itself a Handlebars template; substituted fragments
//! are validated before emission so the output always parses.

use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

use crate::engine::Precompiled;
use crate::error::{EngineError, WriteError};

/// Bump when the skeleton or the embedded registration source changes shape
pub const MODULE_SKELETON_VERSION: u32 = 1;

/// Emitted module shape. The id scheme, the `handlebars` dependency, and
/// the three-statement body are a compatibility surface for downstream
/// loaders and must not change.
pub const MODULE_SKELETON: &str = r#"define("{{plugin}}!{{module}}", ["handlebars"], function(Handlebars) {
   var t = Handlebars.template({{{fn}}})
   var partialFunction = {{{partial_fn}}}
   partialFunction("{{module}}", t)
   return t
})
"#;

/// Partial-registration logic carried verbatim inside every emitted module
/// so the output stays self-contained. Must agree with [`crate::partials`].
pub const PARTIAL_REGISTRATION_SOURCE: &str = r#"function(name, template) {
   var segments = name.split("/")
   var start = 0
   while (start < segments.length - 1 && (segments[start] === "templates" || segments[start] === "partials")) {
      start += 1
   }
   var kept = segments.slice(start)
   var leaf = kept[kept.length - 1]
   if (leaf.charAt(0) !== "_") {
      return
   }
   kept[kept.length - 1] = leaf.slice(1)
   Handlebars.registerPartial(kept.join("."), template)
}"#;

#[derive(Serialize)]
struct SkeletonContext<'a> {
    plugin: &'a str,
    module: &'a str,
    #[serde(rename = "fn")]
    fn_source: &'a str,
    partial_fn: &'a str,
}

/// Plugin identifiers: ASCII alphanumeric plus `_` and `-`
pub fn valid_plugin_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Module paths additionally allow `.` and `/`
pub fn valid_module_path(path: &str) -> bool {
    !path.is_empty()
        && path
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/'))
}

/// Render the wrapper module for one recorded template
pub fn render_module(plugin: &str, module: &str, envelope: &Precompiled) -> Result<String, WriteError> {
    debug!(%plugin, %module, "render_module: called");
    if !valid_plugin_name(plugin) {
        return Err(WriteError::InvalidPluginName { name: plugin.to_string() });
    }
    if !valid_module_path(module) {
        return Err(WriteError::InvalidModulePath { path: module.to_string() });
    }

    let fn_source = envelope.to_embedded()?;
    check_template_fragment(&fn_source)?;
    check_function_fragment(PARTIAL_REGISTRATION_SOURCE)?;

    let hbs = Handlebars::new();
    let context = SkeletonContext {
        plugin,
        module,
        fn_source: &fn_source,
        partial_fn: PARTIAL_REGISTRATION_SOURCE,
    };
    let rendered = hbs
        .render_template(MODULE_SKELETON, &context)
        .map_err(EngineError::from)?;
    Ok(rendered)
}

fn check_template_fragment(fragment: &str) -> Result<(), WriteError> {
    if let Err(e) = serde_json::from_str::<serde_json::Value>(fragment) {
        return Err(WriteError::MalformedFragment {
            what: "template",
            reason: e.to_string(),
        });
    }
    Ok(())
}

fn check_function_fragment(fragment: &str) -> Result<(), WriteError> {
    if !fragment.starts_with("function") {
        return Err(WriteError::MalformedFragment {
            what: "registration",
            reason: "not a function expression".to_string(),
        });
    }
    balanced(fragment).map_err(|reason| WriteError::MalformedFragment {
        what: "registration",
        reason,
    })
}

/// String-aware balance check over `()` and `{}`
fn balanced(source: &str) -> Result<(), String> {
    let mut parens: i64 = 0;
    let mut braces: i64 = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in source.chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' => parens += 1,
            ')' => parens -= 1,
            '{' => braces += 1,
            '}' => braces -= 1,
            _ => {}
        }
        if parens < 0 || braces < 0 {
            return Err("unexpected closing delimiter".to_string());
        }
    }

    if quote.is_some() {
        return Err("unterminated string literal".to_string());
    }
    if parens != 0 || braces != 0 {
        return Err("unbalanced delimiters".to_string());
    }
    Ok(())
}

//! Partial detection and name derivation from module paths
//!
//! A template is a partial when the final path segment starts with `_`.
//! The derived name drops leading `templates`/`partials` segments, strips
//! the underscore marker, and joins the rest with dots, so
//! `templates/foo/_bar` registers as `foo.bar`.

/// Check whether a module path names a partial template
pub fn is_partial(module: &str) -> bool {
    final_segment(module).starts_with('_')
}

/// Derive the partial name for a module path, or `None` for non-partials.
/// Only leading marker segments are dropped; interior segments named
/// `templates` or `partials` survive into the dotted name.
pub fn partial_name(module: &str) -> Option<String> {
    if !is_partial(module) {
        return None;
    }

    let segments: Vec<&str> = module.split('/').collect();
    let mut start = 0;
    while start < segments.len() - 1 && matches!(segments[start], "templates" | "partials") {
        start += 1;
    }

    let mut kept: Vec<&str> = segments[start..].to_vec();
    let last = kept.len() - 1;
    kept[last] = &kept[last][1..];
    Some(kept.join("."))
}

fn final_segment(module: &str) -> &str {
    match module.rfind('/') {
        Some(idx) => &module[idx + 1..],
        None => module,
    }
}

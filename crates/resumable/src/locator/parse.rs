//! Locator string parsing

use tracing::trace;

use super::path::{classify, normalize, resolve, split_prefix};
use super::projection::{is_identifier, parse_query};
use super::{ExportName, Locator, LocatorKind};
use crate::error::{LocatorError, Result};
use crate::graph::NodeId;

/// File extensions that end a module path rather than name an export.
const MODULE_EXTENSIONS: &[&str] = &[
    "js", "mjs", "cjs", "ts", "mts", "tsx", "jsx", "json", "wasm", "rs",
];

pub(super) fn parse(raw: &str, base: &str) -> Result<Locator> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(LocatorError::malformed(raw, "empty locator"));
    }

    let (body, query) = match trimmed.split_once('?') {
        Some((body, query)) => (body, Some(query)),
        None => (trimmed, None),
    };
    let projections = match query {
        Some(query) => parse_query(query).map_err(|reason| LocatorError::malformed(raw, reason))?,
        None => Vec::new(),
    };

    let (body, captured) = split_captures(raw, body)?;
    let (module, export) = split_export(raw, body)?;

    if module.contains(|c: char| c.is_whitespace() || matches!(c, '[' | ']' | '#')) {
        return Err(LocatorError::malformed(raw, "module path contains a reserved character"));
    }
    let kind = classify(module).ok_or_else(|| {
        LocatorError::malformed(
            raw,
            "expected `scheme://`, `scheme:`, `/`, `./` or `../` prefix",
        )
    })?;

    let module_path = match kind {
        LocatorKind::Relative => resolve(module, base)?,
        other => normalize(module, other),
    };
    let kind = classify(&module_path).unwrap_or(kind);

    trace!(raw, module = %module_path, export = export.as_str(), "parsed locator");
    Ok(Locator {
        kind,
        module_path,
        export,
        captured,
        projections,
    })
}

/// Split a trailing `[id id ...]` capture list off the body.
fn split_captures<'a>(raw: &str, body: &'a str) -> Result<(&'a str, Vec<NodeId>)> {
    let Some(inner) = body.strip_suffix(']') else {
        return Ok((body, Vec::new()));
    };
    let open = inner
        .rfind('[')
        .ok_or_else(|| LocatorError::malformed(raw, "unbalanced `]`"))?;
    let ids = inner[open + 1..]
        .split_whitespace()
        .map(|id| {
            id.parse::<NodeId>()
                .map_err(|_| LocatorError::malformed(raw, format!("invalid captured ref `{}`", id)))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok((&inner[..open], ids))
}

/// Split the export selector (`#symbol` or `.symbol`) off the module path.
fn split_export<'a>(raw: &str, body: &'a str) -> Result<(&'a str, ExportName)> {
    if let Some((module, symbol)) = body.split_once('#') {
        if !is_identifier(symbol) {
            return Err(LocatorError::malformed(
                raw,
                format!("invalid symbol name `{}`", symbol),
            ));
        }
        return Ok((module, ExportName::from_symbol(symbol)));
    }
    Ok(split_dotted_export(body))
}

/// Whether a bare `module` would re-parse with a dotted export split off,
/// so a default export must be written as `#default`.
pub(super) fn reads_as_dotted_export(module: &str) -> bool {
    split_dotted_export(module).0.len() != module.len()
}

/// Recognize `./greet.sayHi`: a final-segment suffix that is an identifier
/// and not a known module extension names an export.
fn split_dotted_export(body: &str) -> (&str, ExportName) {
    let Some(kind) = classify(body) else {
        return (body, ExportName::Default);
    };
    let (prefix, path) = split_prefix(body, kind);
    let segment_start = path.rfind('/').map_or(0, |slash| slash + 1);
    if kind == LocatorKind::Absolute && path.is_empty() {
        return (body, ExportName::Default);
    }
    let segment = &path[segment_start..];
    let Some(dot) = segment.rfind('.') else {
        return (body, ExportName::Default);
    };
    let (stem, symbol) = (&segment[..dot], &segment[dot + 1..]);
    if stem.is_empty()
        || stem.chars().all(|c| c == '.')
        || !is_identifier(symbol)
        || MODULE_EXTENSIONS.contains(&symbol)
    {
        return (body, ExportName::Default);
    }
    let module_len = prefix.len() + segment_start + dot;
    (&body[..module_len], ExportName::from_symbol(symbol))
}

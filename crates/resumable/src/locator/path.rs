//! Module path classification, normalization, and relative resolution

use super::LocatorKind;
use crate::error::{LocatorError, Result};

/// Classify a module path by its leading characters.
pub(crate) fn classify(module: &str) -> Option<LocatorKind> {
    if module.starts_with("./") || module.starts_with("../") || module == "." || module == ".." {
        return Some(LocatorKind::Relative);
    }
    if module.starts_with("//") {
        return None;
    }
    if module.starts_with('/') {
        return Some(LocatorKind::RootRelative);
    }
    let scheme_len = scheme_len(module)?;
    let rest = &module[scheme_len + 1..];
    if let Some(after) = rest.strip_prefix("//") {
        (!after.is_empty()).then_some(LocatorKind::Absolute)
    } else {
        (!rest.is_empty()).then_some(LocatorKind::Scheme)
    }
}

/// Length of a leading `scheme` (the part before `:`), if any.
fn scheme_len(module: &str) -> Option<usize> {
    let colon = module.find(':')?;
    let scheme = &module[..colon];
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    chars
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        .then_some(colon)
}

/// Split a module path into its fixed prefix and its normalizable path.
///
/// For `https://cdn.example/a/b.js` that is `("https://cdn.example", "/a/b.js")`;
/// for `file:src/a.js` it is `("file:", "src/a.js")`.
pub(crate) fn split_prefix(module: &str, kind: LocatorKind) -> (&str, &str) {
    match kind {
        LocatorKind::Absolute => {
            let Some(colon) = scheme_len(module) else {
                return ("", module);
            };
            let authority_start = colon + 3;
            match module[authority_start..].find('/') {
                Some(slash) => module.split_at(authority_start + slash),
                None => (module, ""),
            }
        }
        LocatorKind::Scheme => match scheme_len(module) {
            Some(colon) => module.split_at(colon + 1),
            None => ("", module),
        },
        LocatorKind::RootRelative | LocatorKind::Relative => ("", module),
    }
}

/// Remove `.` and `..` segments.
///
/// Rooted paths never climb above `/`. Unrooted paths keep leading `..`
/// segments; with `dot_prefix` they render as `./x` or `../x`.
pub(crate) fn normalize_path(path: &str, dot_prefix: bool) -> String {
    if path.is_empty() {
        return String::new();
    }
    let rooted = path.starts_with('/');
    let trailing = path.len() > 1 && (path.ends_with('/') || path.ends_with("/.") || path.ends_with("/.."));

    let mut stack: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match stack.last() {
                Some(&last) if last != ".." => {
                    stack.pop();
                }
                _ if rooted => {}
                _ => stack.push(".."),
            },
            other => stack.push(other),
        }
    }

    let joined = stack.join("/");
    let mut out = if rooted {
        format!("/{}", joined)
    } else if stack.is_empty() {
        if dot_prefix { ".".to_string() } else { String::new() }
    } else if stack[0] == ".." || !dot_prefix {
        joined
    } else {
        format!("./{}", joined)
    };
    if trailing && !out.ends_with('/') {
        out.push('/');
    }
    out
}

/// Normalize a module path of a known kind.
pub(crate) fn normalize(module: &str, kind: LocatorKind) -> String {
    let (prefix, path) = split_prefix(module, kind);
    let dot_prefix = kind == LocatorKind::Relative;
    format!("{}{}", prefix, normalize_path(path, dot_prefix))
}

/// Resolve a relative module path against the location of the importing code.
pub(crate) fn resolve(module: &str, base: &str) -> Result<String> {
    let base = base.trim();
    let base = base
        .find(['#', '?'])
        .map_or(base, |end| &base[..end]);
    if base.is_empty() {
        return Ok(normalize(module, LocatorKind::Relative));
    }

    let base_kind = classify(base).ok_or_else(|| {
        LocatorError::malformed(base, "base reference is not an absolute, scheme, or relative location")
    })?;
    let (prefix, base_path) = split_prefix(base, base_kind);
    let dir = match base_path.rfind('/') {
        Some(slash) => &base_path[..=slash],
        None => "",
    };
    let dir = if dir.is_empty() && base_kind == LocatorKind::Absolute {
        "/"
    } else {
        dir
    };

    let joined = format!("{}{}", dir, module);
    let dot_prefix = base_kind == LocatorKind::Relative;
    Ok(format!("{}{}", prefix, normalize_path(&joined, dot_prefix)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_forms() {
        assert_eq!(classify("https://cdn.example/a.js"), Some(LocatorKind::Absolute));
        assert_eq!(classify("file:src/a.js"), Some(LocatorKind::Scheme));
        assert_eq!(classify("/build/a.js"), Some(LocatorKind::RootRelative));
        assert_eq!(classify("./a.js"), Some(LocatorKind::Relative));
        assert_eq!(classify("../a.js"), Some(LocatorKind::Relative));
        assert_eq!(classify("a.js"), None);
        assert_eq!(classify("//cdn.example/a.js"), None);
        assert_eq!(classify("https://"), None);
        assert_eq!(classify("1http://x"), None);
    }

    #[test]
    fn test_normalize_relative() {
        assert_eq!(normalize_path("./a/./b/../c.js", true), "./a/c.js");
        assert_eq!(normalize_path("./../x.js", true), "../x.js");
        assert_eq!(normalize_path("../../x.js", true), "../../x.js");
        assert_eq!(normalize_path("./a/..", true), "./");
    }

    #[test]
    fn test_normalize_rooted_never_climbs_above_root() {
        assert_eq!(normalize_path("/../../a.js", true), "/a.js");
        assert_eq!(normalize_path("/a/b/../../c", true), "/c");
    }

    #[test]
    fn test_resolve_against_relative_base() {
        assert_eq!(
            resolve("../lib/x.js", "./components/app.js").unwrap(),
            "./lib/x.js"
        );
        assert_eq!(resolve("../x.js", "./app.js").unwrap(), "../x.js");
        assert_eq!(resolve("./greet", "").unwrap(), "./greet");
    }

    #[test]
    fn test_resolve_against_absolute_base() {
        assert_eq!(
            resolve("./greet.js", "https://cdn.example/build/app.js").unwrap(),
            "https://cdn.example/build/greet.js"
        );
        assert_eq!(
            resolve("../../../greet.js", "https://cdn.example/build/app.js").unwrap(),
            "https://cdn.example/greet.js"
        );
        assert_eq!(
            resolve("./greet.js", "https://cdn.example").unwrap(),
            "https://cdn.example/greet.js"
        );
    }

    #[test]
    fn test_resolve_against_root_and_scheme_bases() {
        assert_eq!(resolve("./b.js", "/app/a.js").unwrap(), "/app/b.js");
        assert_eq!(resolve("./b.js", "file:src/a.js").unwrap(), "file:src/b.js");
        assert_eq!(resolve("./b.js", "/app/a.js#main").unwrap(), "/app/b.js");
    }

    #[test]
    fn test_resolve_rejects_malformed_base() {
        let err = resolve("./b.js", "not a path").unwrap_err();
        assert_eq!(err.raw(), "not a path");
    }
}

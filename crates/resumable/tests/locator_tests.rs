//! Locator parsing, rendering, and projection evaluation

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use resumable::locator::{Projection, ProjectionPath, ProjectionStep};
use resumable::*;

// ═══════════════════════════════════════════════════════════════════════
// Parsing
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_relative_locator_resolves_against_base() {
    let loc = Locator::parse("../shared/util.js#format", "./pages/home/index.js").unwrap();
    assert_eq!(loc.kind(), LocatorKind::Relative);
    assert_eq!(loc.module_path(), "./pages/shared/util.js");
    assert_eq!(loc.symbol_name(), Some("format"));
}

#[test]
fn test_root_relative_ignores_base() {
    let loc = Locator::parse("/assets/app.js#main", "https://cdn.example/build/a.js").unwrap();
    assert_eq!(loc.kind(), LocatorKind::RootRelative);
    assert_eq!(loc.module_path(), "/assets/app.js");
}

#[test]
fn test_default_export_renders_without_symbol() {
    let loc: Locator = "./widget.js".parse().unwrap();
    assert_eq!(loc.export(), &ExportName::Default);
    assert_eq!(loc.symbol_name(), None);
    assert_eq!(loc.to_string(), "./widget.js");
}

#[test]
fn test_for_symbol_matches_parse() {
    let built = Locator::for_symbol("./greet", "sayHi").unwrap();
    let parsed: Locator = "./greet#sayHi".parse().unwrap();
    assert_eq!(built, parsed);
    assert_eq!(built.key(), parsed.key());
}

#[test]
fn test_key_ignores_captures_and_projections() {
    let plain: Locator = "./h.js#onClick".parse().unwrap();
    let bound: Locator = "./h.js#onClick[3 4]?x=$.detail".parse().unwrap();
    assert_ne!(plain, bound);
    assert_eq!(plain.key(), bound.key());
    assert_eq!(bound.unbound(), plain);
}

#[test]
fn test_malformed_locator_reports_raw_input() {
    let err = Locator::parse("no-prefix.js#f", "").unwrap_err();
    assert_eq!(err.raw(), "no-prefix.js#f");
    assert!(err.to_string().contains("no-prefix.js#f"));
}

#[test]
fn test_duplicate_projection_key_is_malformed() {
    assert!(Locator::parse("./h.js#f?a=$.x&a=$.y", "").is_err());
}

// ═══════════════════════════════════════════════════════════════════════
// Projections
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_projection_path_steps() {
    let path = ProjectionPath::parse("$.items.0.label").unwrap();
    assert_eq!(
        path.steps(),
        &[
            ProjectionStep::ImplicitArg,
            ProjectionStep::Member("items".into()),
            ProjectionStep::Index(0),
            ProjectionStep::Member("label".into()),
        ]
    );
}

#[test]
fn test_projection_reads_first_argument() {
    let event = Value::object(ObjectValue::new().with_field(
        "target",
        Value::object(ObjectValue::new().with_field("value", Value::string("typed"))),
    ));
    let ctx = InvocationContext::new().with_args(vec![event]);
    let path = ProjectionPath::parse("$.target.value").unwrap();
    assert_eq!(path.evaluate(&ctx).unwrap(), Value::string("typed"));
}

#[test]
fn test_projection_reads_scope_and_array_elements() {
    let scope = Value::object(ObjectValue::new().with_field(
        "rows",
        Value::array(vec![Value::Int(10), Value::Int(20)]),
    ));
    let ctx = InvocationContext::new().with_scope(scope);
    let path = ProjectionPath::parse("rows.1").unwrap();
    assert_eq!(path.evaluate(&ctx).unwrap(), Value::Int(20));
}

#[test]
fn test_unresolved_projection_names_failing_step() {
    let ctx = InvocationContext::new().with_args(vec![Value::object(ObjectValue::new())]);
    let path = ProjectionPath::parse("$.target.value").unwrap();
    let err = path.evaluate(&ctx).unwrap_err();
    assert_eq!(
        err,
        ProjectionError::Unresolved {
            path: "$.target.value".into(),
            step: "target".into(),
        }
    );
}

#[test]
fn test_with_projection_appends_to_query() {
    let loc: Locator = "./h.js#f".parse().unwrap();
    let loc = loc.with_projection(Projection::parse("v=$.value").unwrap());
    assert_eq!(loc.to_string(), "./h.js#f?v=$.value");
}

// ═══════════════════════════════════════════════════════════════════════
// Properties
// ═══════════════════════════════════════════════════════════════════════

fn symbol() -> impl Strategy<Value = String> {
    "[a-z][a-zA-Z0-9_]{0,8}".prop_filter("default is not a named export", |s| s != "default")
}

/// Module paths in all four reference forms. File names may carry a known
/// extension, an unknown dotted suffix, or nothing.
fn module() -> impl Strategy<Value = String> {
    let prefix = prop_oneof![
        Just("https://cdn.example/".to_string()),
        Just("file:".to_string()),
        Just("/".to_string()),
        Just("./".to_string()),
        Just("../".to_string()),
    ];
    let suffix = prop_oneof![
        Just(String::new()),
        prop::sample::select(vec!["js", "mjs", "ts", "json"]).prop_map(|e| format!(".{}", e)),
        "[a-z]{1,6}".prop_map(|s| format!(".{}", s)),
        Just(".default".to_string()),
    ];
    (
        prefix,
        prop::collection::vec("[a-z]{1,6}", 0..3),
        "[a-z]{1,8}",
        suffix,
    )
        .prop_map(|(prefix, dirs, file, suffix)| {
            let mut path = prefix;
            for dir in dirs {
                path.push_str(&dir);
                path.push('/');
            }
            format!("{}{}{}", path, file, suffix)
        })
}

fn query() -> impl Strategy<Value = String> {
    let path = prop::sample::select(vec!["$", "$.a.0", "b", "$.target.value", "row.2.label"]);
    prop::collection::vec(path, 0..3).prop_map(|paths| {
        paths
            .iter()
            .enumerate()
            .map(|(i, path)| format!("k{}={}", i, path))
            .collect::<Vec<_>>()
            .join("&")
    })
}

proptest! {
    #[test]
    fn test_render_then_parse_is_identity(
        module in module(),
        sym in prop::option::of(symbol()),
        ids in prop::collection::vec(0usize..500, 0..4),
        query in query(),
    ) {
        let mut raw = format!("{}#{}", module, sym.as_deref().unwrap_or("default"));
        if !query.is_empty() {
            raw.push('?');
            raw.push_str(&query);
        }

        let loc = Locator::parse(&raw, "").unwrap().with_captured(ids.clone());
        let rendered = loc.to_string();
        let reparsed = Locator::parse(&rendered, "").unwrap();

        prop_assert_eq!(&reparsed, &loc);
        prop_assert_eq!(reparsed.to_string(), rendered);
        prop_assert_eq!(reparsed.captured(), ids.as_slice());
        prop_assert_eq!(reparsed.symbol_name(), sym.as_deref());
        prop_assert_eq!(reparsed.projections().len(), loc.projections().len());
    }

    #[test]
    fn test_parse_never_panics(raw in "\\PC{0,40}") {
        let _ = Locator::parse(&raw, "./base/a.js");
    }
}

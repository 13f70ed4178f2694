//! Linear text encoding of snapshots
//!
//! One record per line, fields separated by tabs. The first line lists the
//! root ids after an `@`; each following line is node `n` in id order.
//! Strings, field names, and locators are JSON string literals, so tabs and
//! newlines inside them never break the framing.
//!
//! ```text
//! @	0
//! o	-	"name"	1	"self"	2
//! s	"a"
//! 0
//! ```
//!
//! A record consisting only of digits is a back-reference to that id.

use std::fmt::Write as _;
use std::sync::Arc;

use tracing::{debug, warn};

use super::{Node, NodeId, Snapshot, Warning, WarningKind};
use crate::error::{DecodeError, LocatorError};
use crate::locator::Locator;
use crate::value::ReactiveVariant;

const ROOTS: char = '@';

/// Render a snapshot as text.
pub fn encode_text(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    out.push(ROOTS);
    for id in &snapshot.roots {
        let _ = write!(out, "\t{}", id);
    }
    for node in &snapshot.nodes {
        out.push('\n');
        encode_node(&mut out, node);
    }
    out
}

fn encode_node(out: &mut String, node: &Node) {
    match node {
        Node::Undefined => out.push('u'),
        Node::Null => out.push('n'),
        Node::Bool(b) => {
            let _ = write!(out, "b\t{}", b);
        }
        Node::Int(n) => {
            let _ = write!(out, "i\t{}", n);
        }
        Node::Float(n) => {
            let _ = write!(out, "d\t{}", n);
        }
        Node::String(s) => {
            let _ = write!(out, "s\t{}", quote(s));
        }
        Node::Array(items) => {
            out.push('a');
            push_ids(out, items);
        }
        Node::Map(entries) => {
            out.push('m');
            for (key, value) in entries {
                let _ = write!(out, "\t{}\t{}", key, value);
            }
        }
        Node::Set(members) => {
            out.push('e');
            push_ids(out, members);
        }
        Node::Object {
            constructor,
            fields,
        } => {
            out.push_str("o\t");
            match constructor {
                Some(locator) => out.push_str(&quote(&locator.to_string())),
                None => out.push('-'),
            }
            push_fields(out, fields);
        }
        Node::Reactive { variant, target } => {
            let _ = write!(out, "r\t{}\t{}", variant.as_str(), target);
        }
        Node::Locator(locator) => {
            let _ = write!(out, "q\t{}", quote(&locator.to_string()));
        }
        Node::Custom { tag, fields } => {
            let _ = write!(out, "c\t{}", quote(tag));
            push_fields(out, fields);
        }
        Node::BackRef(target) => {
            let _ = write!(out, "{}", target);
        }
        Node::Unresolvable(diagnostic) => {
            let _ = write!(out, "x\t{}", quote(diagnostic));
        }
    }
}

fn push_ids(out: &mut String, ids: &[NodeId]) {
    for id in ids {
        let _ = write!(out, "\t{}", id);
    }
}

fn push_fields(out: &mut String, fields: &[(String, NodeId)]) {
    for (name, id) in fields {
        let _ = write!(out, "\t{}\t{}", quote(name), id);
    }
}

fn quote(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// Parse text produced by [`encode_text`].
///
/// Locator strings are resolved against `base`. A locator that fails to
/// parse does not fail the decode: its node becomes
/// [`Node::Unresolvable`] carrying the raw string, with a warning.
///
/// # Errors
///
/// Returns `DecodeError::Format` when the text is not a well-formed
/// record stream.
pub fn decode_text(text: &str, base: &str) -> Result<Snapshot, DecodeError> {
    let mut lines = text.strip_suffix('\n').unwrap_or(text).split('\n');
    let header = lines.next().unwrap_or_default();
    let roots = match header.strip_prefix(ROOTS) {
        Some(rest) => fields(rest)
            .map(|field| parse_id(1, field))
            .collect::<Result<Vec<_>, _>>()?,
        None => return Err(format_error(1, "missing `@` roots line")),
    };

    let mut snapshot = Snapshot {
        roots,
        ..Default::default()
    };
    for (index, line) in lines.enumerate() {
        let line_no = index + 2;
        let id = snapshot.nodes.len();
        let node = decode_record(line_no, line, base).unwrap_or_else(|(raw, err)| {
            warn!(id, raw = %raw, error = %err, "malformed locator in snapshot");
            snapshot.warnings.push(Warning {
                node: id,
                kind: WarningKind::MalformedLocator,
                message: err.to_string(),
            });
            Ok(Node::Unresolvable(raw))
        })?;
        snapshot.nodes.push(node);
    }

    debug!(
        nodes = snapshot.nodes.len(),
        roots = snapshot.roots.len(),
        "decoded snapshot text"
    );
    Ok(snapshot)
}

/// Outer error: a recoverable locator failure with its raw string.
/// Inner error: a fatal format error.
type Record = Result<Result<Node, DecodeError>, (String, LocatorError)>;

fn decode_record(line: usize, record: &str, base: &str) -> Record {
    if !record.is_empty() && record.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(parse_id(line, record).map(Node::BackRef));
    }
    let (tag, rest) = record.split_once('\t').unwrap_or((record, ""));
    let mut fields = fields(rest);

    let node = match tag {
        "u" => Ok(Node::Undefined),
        "n" => Ok(Node::Null),
        "b" => match next(line, &mut fields) {
            Ok("true") => Ok(Node::Bool(true)),
            Ok("false") => Ok(Node::Bool(false)),
            Ok(other) => Err(format_error(line, format!("invalid bool `{}`", other))),
            Err(err) => Err(err),
        },
        "i" => next(line, &mut fields).and_then(|f| {
            f.parse()
                .map(Node::Int)
                .map_err(|_| format_error(line, format!("invalid int `{}`", f)))
        }),
        "d" => next(line, &mut fields).and_then(|f| {
            f.parse()
                .map(Node::Float)
                .map_err(|_| format_error(line, format!("invalid float `{}`", f)))
        }),
        "s" => next(line, &mut fields)
            .and_then(|f| unquote(line, f))
            .map(|s| Node::String(Arc::from(s))),
        "a" => ids(line, fields).map(Node::Array),
        "e" => ids(line, fields).map(Node::Set),
        "m" => ids(line, fields).and_then(|ids| {
            if ids.len() % 2 != 0 {
                return Err(format_error(line, "map record has an odd number of ids"));
            }
            Ok(Node::Map(ids.chunks(2).map(|kv| (kv[0], kv[1])).collect()))
        }),
        "o" => {
            let constructor = match next(line, &mut fields) {
                Ok("-") => None,
                Ok(field) => match unquote(line, field) {
                    Ok(raw) => Some(Locator::parse(&raw, base).map_err(|err| (raw, err))?),
                    Err(err) => return Ok(Err(err)),
                },
                Err(err) => return Ok(Err(err)),
            };
            named_ids(line, fields).map(|fields| Node::Object {
                constructor,
                fields,
            })
        }
        "r" => next(line, &mut fields).and_then(|name| {
            let variant = ReactiveVariant::from_name(name)
                .ok_or_else(|| format_error(line, format!("unknown reactive variant `{}`", name)))?;
            let target = parse_id(line, next(line, &mut fields)?)?;
            Ok(Node::Reactive { variant, target })
        }),
        "q" => match next(line, &mut fields).and_then(|f| unquote(line, f)) {
            Ok(raw) => Ok(Node::Locator(
                Locator::parse(&raw, base).map_err(|err| (raw, err))?,
            )),
            Err(err) => Err(err),
        },
        "c" => next(line, &mut fields)
            .and_then(|f| unquote(line, f))
            .and_then(|tag| named_ids(line, fields).map(|fields| Node::Custom { tag, fields })),
        "x" => next(line, &mut fields)
            .and_then(|f| unquote(line, f))
            .map(Node::Unresolvable),
        other => Err(format_error(line, format!("unknown record tag `{}`", other))),
    };
    Ok(node)
}

fn fields(rest: &str) -> impl Iterator<Item = &str> {
    rest.split('\t').filter(|f| !f.is_empty())
}

fn next<'a>(line: usize, fields: &mut impl Iterator<Item = &'a str>) -> Result<&'a str, DecodeError> {
    fields
        .next()
        .ok_or_else(|| format_error(line, "record is missing a field"))
}

fn ids<'a>(line: usize, fields: impl Iterator<Item = &'a str>) -> Result<Vec<NodeId>, DecodeError> {
    fields.map(|f| parse_id(line, f)).collect()
}

fn named_ids<'a>(
    line: usize,
    mut fields: impl Iterator<Item = &'a str>,
) -> Result<Vec<(String, NodeId)>, DecodeError> {
    let mut out = Vec::new();
    while let Some(name) = fields.next() {
        let name = unquote(line, name)?;
        let id = parse_id(line, next(line, &mut fields)?)?;
        out.push((name, id));
    }
    Ok(out)
}

fn parse_id(line: usize, field: &str) -> Result<NodeId, DecodeError> {
    field
        .parse()
        .map_err(|_| format_error(line, format!("invalid node id `{}`", field)))
}

fn unquote(line: usize, field: &str) -> Result<String, DecodeError> {
    serde_json::from_str(field)
        .map_err(|err| format_error(line, format!("invalid string literal: {}", err)))
}

fn format_error(line: usize, message: impl Into<String>) -> DecodeError {
    DecodeError::Format {
        line,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Snapshot {
        Snapshot {
            nodes: vec![
                Node::Object {
                    constructor: None,
                    fields: vec![("name".into(), 1), ("self".into(), 2)],
                },
                Node::String(Arc::from("tab\there")),
                Node::BackRef(0),
            ],
            roots: vec![0],
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_encode_layout() {
        assert_eq!(
            encode_text(&sample()),
            "@\t0\no\t-\t\"name\"\t1\t\"self\"\t2\ns\t\"tab\\there\"\n0"
        );
    }

    #[test]
    fn test_decode_reverses_encode() {
        let text = encode_text(&sample());
        assert_eq!(decode_text(&text, "").unwrap(), sample());
    }

    #[test]
    fn test_locator_records_keep_captures() {
        let snapshot = Snapshot {
            nodes: vec![
                Node::Locator(Locator::parse("./h.js#onClick[1]", "").unwrap()),
                Node::Int(7),
            ],
            roots: vec![0],
            warnings: Vec::new(),
        };
        let text = encode_text(&snapshot);
        assert!(text.contains("q\t\"./h.js#onClick[1]\""));
        assert_eq!(decode_text(&text, "").unwrap(), snapshot);
    }

    #[test]
    fn test_malformed_locator_becomes_unresolvable() {
        let text = "@\t0\na\t1\nq\t\"greet.js#sayHi\"";
        let snapshot = decode_text(text, "").unwrap();
        assert_eq!(snapshot.nodes[1], Node::Unresolvable("greet.js#sayHi".into()));
        assert_eq!(snapshot.warnings.len(), 1);
        assert_eq!(snapshot.warnings[0].node, 1);
        assert_eq!(snapshot.warnings[0].kind, WarningKind::MalformedLocator);
    }

    #[test]
    fn test_format_errors_report_line() {
        assert!(matches!(
            decode_text("o\t-", ""),
            Err(DecodeError::Format { line: 1, .. })
        ));
        assert!(matches!(
            decode_text("@\t0\nz", ""),
            Err(DecodeError::Format { line: 2, .. })
        ));
        assert!(matches!(
            decode_text("@\t0\nm\t1", ""),
            Err(DecodeError::Format { line: 2, .. })
        ));
    }

    #[test]
    fn test_special_floats() {
        let snapshot = Snapshot {
            nodes: vec![
                Node::Float(f64::INFINITY),
                Node::Float(-0.0),
                Node::Float(1.0),
            ],
            roots: vec![0, 1, 2],
            warnings: Vec::new(),
        };
        let decoded = decode_text(&encode_text(&snapshot), "").unwrap();
        assert_eq!(decoded, snapshot);
    }
}

//! Resource locators: handles naming a unit of behavior without loading it
//!
//! A locator names `{module path, export, captured refs}` plus optional
//! projection rules that pull values out of the invocation context.
//!
//! # Grammar
//!
//! ```text
//! locator  := module [ "#" symbol | "." symbol ] [ "[" id { " " id } "]" ] [ "?" query ]
//! module   := scheme "://" rest      (absolute)
//!           | scheme ":" rest        (scheme path, e.g. `file:src/a.js`)
//!           | "/" path               (root-relative)
//!           | "./" path | "../" path (relative)
//! query    := key "=" path { "&" key "=" path }
//! ```
//!
//! # Example
//!
//! ```
//! use resumable::locator::{ExportName, Locator, LocatorKind};
//!
//! let loc = Locator::parse("../lib/greet.js#sayHi[0 3]", "./components/app.js").unwrap();
//! assert_eq!(loc.kind(), LocatorKind::Relative);
//! assert_eq!(loc.module_path(), "./lib/greet.js");
//! assert_eq!(loc.export(), &ExportName::Named("sayHi".into()));
//! assert_eq!(loc.captured(), &[0, 3]);
//! assert_eq!(loc.to_string(), "./lib/greet.js#sayHi[0 3]");
//! ```

mod parse;
mod path;
mod projection;

pub use projection::{Projection, ProjectionPath, ProjectionStep};

use std::fmt;

use crate::error::Result;
use crate::graph::NodeId;

/// Which of the accepted reference forms a module path uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocatorKind {
    /// `scheme://authority/path`
    Absolute,
    /// `scheme:path`, e.g. `file:src/app.js`
    Scheme,
    /// `/path`
    RootRelative,
    /// `./path` or `../path`
    Relative,
}

/// The export a locator selects.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExportName {
    /// The module's default export
    Default,
    /// A named export
    Named(String),
}

impl ExportName {
    /// Map a symbol name, treating `default` as the default export
    pub fn from_symbol(symbol: &str) -> Self {
        if symbol == "default" {
            ExportName::Default
        } else {
            ExportName::Named(symbol.to_string())
        }
    }

    /// Name used in diagnostics
    pub fn as_str(&self) -> &str {
        match self {
            ExportName::Default => "default",
            ExportName::Named(name) => name,
        }
    }
}

/// Cache key for a loaded symbol: two locators with equal keys resolve to
/// the same value regardless of captures or projections.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymbolKey {
    /// Normalized module path
    pub module: String,
    /// Selected export
    pub export: ExportName,
}

impl fmt::Display for SymbolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.module)?;
        write_export(f, &self.module, &self.export)
    }
}

/// `#name` for named exports. The default export is implicit unless the
/// module path alone would read as `module.symbol`.
fn write_export(f: &mut fmt::Formatter<'_>, module: &str, export: &ExportName) -> fmt::Result {
    match export {
        ExportName::Named(name) => write!(f, "#{}", name),
        ExportName::Default if parse::reads_as_dotted_export(module) => f.write_str("#default"),
        ExportName::Default => Ok(()),
    }
}

/// An immutable, normalized handle to a unit of behavior.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    kind: LocatorKind,
    module_path: String,
    export: ExportName,
    captured: Vec<NodeId>,
    projections: Vec<Projection>,
}

impl Locator {
    /// Parse a raw locator, resolving relative forms against `base`.
    ///
    /// `base` is the location of the code doing the parse; pass `""` to
    /// keep relative locators relative.
    ///
    /// # Errors
    ///
    /// Returns `LocatorError::Malformed` naming the offending string when
    /// `raw` (or a non-empty `base`) matches none of the accepted forms.
    pub fn parse(raw: &str, base: &str) -> Result<Self> {
        parse::parse(raw, base)
    }

    /// Build a locator for `symbol` in `module` (relative to nothing).
    ///
    /// # Errors
    ///
    /// Returns `LocatorError::Malformed` if the module path or symbol is invalid.
    pub fn for_symbol(module: &str, symbol: &str) -> Result<Self> {
        parse::parse(&format!("{module}#{symbol}"), "")
    }

    /// The reference form of the module path
    pub fn kind(&self) -> LocatorKind {
        self.kind
    }

    /// Normalized module path
    pub fn module_path(&self) -> &str {
        &self.module_path
    }

    /// Selected export
    pub fn export(&self) -> &ExportName {
        &self.export
    }

    /// Named export, or `None` for the default export
    pub fn symbol_name(&self) -> Option<&str> {
        match &self.export {
            ExportName::Default => None,
            ExportName::Named(name) => Some(name),
        }
    }

    /// Ids of captured values in the surrounding serialized graph
    pub fn captured(&self) -> &[NodeId] {
        &self.captured
    }

    /// Projection rules evaluated at invocation time
    pub fn projections(&self) -> &[Projection] {
        &self.projections
    }

    /// Loader cache key
    pub fn key(&self) -> SymbolKey {
        SymbolKey {
            module: self.module_path.clone(),
            export: self.export.clone(),
        }
    }

    /// A copy of this locator with different captured ids
    pub fn with_captured(&self, captured: Vec<NodeId>) -> Self {
        Self {
            captured,
            ..self.clone()
        }
    }

    /// Just the module and export, without captures or projections
    pub fn unbound(&self) -> Self {
        Self {
            captured: Vec::new(),
            projections: Vec::new(),
            ..self.clone()
        }
    }

    /// A copy of this locator with an extra projection rule
    pub fn with_projection(&self, projection: Projection) -> Self {
        let mut next = self.clone();
        next.projections.push(projection);
        next
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.module_path)?;
        write_export(f, &self.module_path, &self.export)?;
        if !self.captured.is_empty() {
            write!(f, "[")?;
            for (i, id) in self.captured.iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{}", id)?;
            }
            write!(f, "]")?;
        }
        for (i, projection) in self.projections.iter().enumerate() {
            write!(f, "{}{}", if i == 0 { '?' } else { '&' }, projection)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for Locator {
    type Err = crate::error::LocatorError;

    fn from_str(s: &str) -> Result<Self> {
        Locator::parse(s, "")
    }
}

//! Import extraction from JavaScript, TypeScript and template sources
//!
//! Script files are parsed with tree-sitter; Handlebars templates are
//! scanned for component invocations. Either way the result is a flat list
//! of [`ImportStatement`]s in source order. That order drives edge
//! insertion in the resolver and therefore the final migration order.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use migration_graph_core::parser::{ImportKind, ImportParser};
//!
//! # fn main() -> Result<(), migration_graph_core::GraphError> {
//! let imports = ImportParser::new().parse_file(Path::new("app/routes/index.ts"))?;
//! for import in imports.iter().filter(|i| i.kind == ImportKind::Service) {
//!     println!("line {}: injects {}", import.range.start_line, import.specifier);
//! }
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};

mod script;
pub mod template;

/// How a dependency was expressed in the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImportKind {
    /// `import x from 'y'`, `import 'y'`, `import x = require('y')`
    Static,
    /// `import type { X } from 'y'`
    TypeOnly,
    /// `export { x } from 'y'`, `export * from 'y'`
    ReExport,
    /// `require('y')`
    Require,
    /// `import('y')`
    Dynamic,
    /// Ember service injection; the specifier is the service name
    Service,
    /// Component invocation in a template; the specifier is the component path
    Template,
}

/// A single dependency reference found in a source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportStatement {
    pub specifier: String,
    pub kind: ImportKind,
    pub range: SourceRange,
}

/// Source location in a file.
///
/// Statement-level ranges only; used for logging unresolved imports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRange {
    /// Byte offset of start (0-based).
    pub start_byte: usize,
    /// Byte offset of end (0-based).
    pub end_byte: usize,
    /// Start line (1-indexed for human readability).
    pub start_line: usize,
    /// End line (1-indexed for human readability).
    pub end_line: usize,
}

/// Source languages understood by the parser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    TypeScript,
    Tsx,
    JavaScript,
    /// Handlebars template
    Template,
}

impl Language {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        match ext {
            "ts" | "mts" | "cts" | "gts" => Some(Language::TypeScript),
            "tsx" => Some(Language::Tsx),
            "js" | "mjs" | "cjs" | "jsx" | "gjs" => Some(Language::JavaScript),
            "hbs" => Some(Language::Template),
            _ => None,
        }
    }
}

/// Extracts dependency references from source files
pub struct ImportParser;

impl ImportParser {
    /// Create a new parser instance
    pub fn new() -> Self {
        ImportParser
    }

    /// Read and parse a file, choosing the language from its extension
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read and `Parse` if the extension
    /// is unknown or tree-sitter produces no tree.
    pub fn parse_file(&self, path: &Path) -> Result<Vec<ImportStatement>> {
        let language = Language::from_path(path).ok_or_else(|| GraphError::Parse {
            path: path.to_path_buf(),
            reason: "unsupported file extension".to_string(),
        })?;
        let source = std::fs::read_to_string(path).map_err(|err| GraphError::io(path, err))?;
        let embedded = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("gts" | "gjs")
        );

        if embedded {
            let stripped = template::strip_embedded_templates(&source);
            self.parse_source(&stripped, language, path)
        } else {
            self.parse_source(&source, language, path)
        }
    }

    /// Parse source text that has already been read
    ///
    /// `path` is only used for error messages.
    pub fn parse_source(&self, source: &str, language: Language, path: &Path) -> Result<Vec<ImportStatement>> {
        match language {
            Language::Template => Ok(template::extract_invocations(source)),
            _ => script::extract_imports(source, language, path),
        }
    }
}

impl Default for ImportParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Ember's `dasherize`: `currentUser` -> `current-user`, `BarBaz` -> `bar-baz`
pub fn dasherize(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut previous: Option<char> = None;
    for ch in name.chars() {
        if ch.is_ascii_uppercase()
            && previous.is_some_and(|p| p.is_ascii_lowercase() || p.is_ascii_digit())
        {
            out.push('-');
        }
        match ch {
            '_' | ' ' => out.push('-'),
            _ => out.push(ch.to_ascii_lowercase()),
        }
        previous = Some(ch);
    }
    out
}

//! Handlebars and embedded `<template>` support

use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use super::{dasherize, ImportKind, ImportStatement, SourceRange};

const OPEN_TAG: &str = "<template>";
const CLOSE_TAG: &str = "</template>";

static INVOCATION: OnceLock<Regex> = OnceLock::new();

fn invocation_regex() -> &'static Regex {
    // `<Foo`, `<Foo::BarBaz`; lower-case tags are plain HTML
    INVOCATION.get_or_init(|| {
        Regex::new(r"<([A-Z][A-Za-z0-9]*(?:::[A-Z][A-Za-z0-9]*)*)[\s/>]")
            .expect("invocation pattern is valid")
    })
}

/// Blank out `<template>` regions of `.gts`/`.gjs` sources
///
/// Every byte inside a region (tags included) becomes a space except line
/// breaks, so byte offsets and line numbers of the remaining script are
/// unchanged. An unterminated region is blanked to the end of the file.
pub fn strip_embedded_templates(source: &str) -> Cow<'_, str> {
    if !source.contains(OPEN_TAG) {
        return Cow::Borrowed(source);
    }

    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    while let Some(start) = rest.find(OPEN_TAG) {
        out.push_str(&rest[..start]);
        let region = &rest[start..];
        let end = region
            .find(CLOSE_TAG)
            .map(|close| close + CLOSE_TAG.len())
            .unwrap_or(region.len());
        for ch in region[..end].chars() {
            match ch {
                '\n' | '\r' => out.push(ch),
                // one space per byte so multi-byte characters keep their width
                _ => out.extend(std::iter::repeat(' ').take(ch.len_utf8())),
            }
        }
        rest = &region[end..];
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Component invocations in a Handlebars template, in source order
///
/// `<Foo::BarBaz @x={{1}} />` yields the specifier `foo/bar-baz`. Each
/// component is reported once.
pub fn extract_invocations(source: &str) -> Vec<ImportStatement> {
    let mut seen = HashSet::new();
    let mut imports = Vec::new();

    for captures in invocation_regex().captures_iter(source) {
        let Some(name) = captures.get(1) else {
            continue;
        };
        let path = name
            .as_str()
            .split("::")
            .map(dasherize)
            .collect::<Vec<_>>()
            .join("/");
        if !seen.insert(path.clone()) {
            continue;
        }
        let line = line_of(source, name.start());
        imports.push(ImportStatement {
            specifier: path,
            kind: ImportKind::Template,
            range: SourceRange {
                start_byte: name.start(),
                end_byte: name.end(),
                start_line: line,
                end_line: line,
            },
        });
    }

    imports
}

fn line_of(source: &str, offset: usize) -> usize {
    source[..offset].bytes().filter(|&b| b == b'\n').count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_keeps_offsets() {
        let source = "import a from './a';\nclass X {\n  <template>\n    <Foo />\n  </template>\n}\nimport b from './b';\n";
        let stripped = strip_embedded_templates(source);

        assert_eq!(stripped.len(), source.len());
        assert_eq!(stripped.lines().count(), source.lines().count());
        assert!(!stripped.contains("Foo"));
        assert!(stripped.contains("import b from './b';"));
    }

    #[test]
    fn test_strip_multibyte_and_unterminated() {
        let source = "const a = 1;\n<template>héllo ✓";
        let stripped = strip_embedded_templates(source);

        assert_eq!(stripped.len(), source.len());
        assert!(stripped.starts_with("const a = 1;\n"));
        assert!(stripped[13..].chars().all(|c| c == ' '));
    }

    #[test]
    fn test_strip_without_templates_borrows() {
        assert!(matches!(strip_embedded_templates("let a = 1;"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_extract_invocations() {
        let source = "<div>\n  <Ui::PriceTag @amount={{this.total}} />\n  <CartSummary>\n    <Ui::PriceTag />\n  </CartSummary>\n  <input>\n</div>\n";
        let imports = extract_invocations(source);
        let specifiers: Vec<&str> = imports.iter().map(|i| i.specifier.as_str()).collect();

        assert_eq!(specifiers, vec!["ui/price-tag", "cart-summary"]);
        assert!(imports.iter().all(|i| i.kind == ImportKind::Template));
        assert_eq!(imports[0].range.start_line, 2);
        assert_eq!(imports[1].range.start_line, 3);
    }
}

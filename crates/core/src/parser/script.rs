//! JavaScript / TypeScript import extraction using tree-sitter
//!
//! Walks the syntax tree in document order and collects module
//! specifiers plus Ember service injections.

use std::collections::HashSet;
use std::path::Path;

use tree_sitter::{Node, Parser as TsParser};

use super::{dasherize, ImportKind, ImportStatement, Language, SourceRange};
use crate::error::{GraphError, Result};

const EMBER_SERVICE_MODULE: &str = "@ember/service";
const SERVICE_EXPORTS: &[&str] = &["service", "inject"];
const SERVICE_LOOKUP_PREFIX: &str = "service:";

pub(super) fn extract_imports(source: &str, language: Language, path: &Path) -> Result<Vec<ImportStatement>> {
    let ts_language: tree_sitter::Language = match language {
        Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        Language::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        Language::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
        Language::Template => {
            return Err(GraphError::Parse {
                path: path.to_path_buf(),
                reason: "templates are not scripts".to_string(),
            })
        }
    };

    let mut parser = TsParser::new();
    parser
        .set_language(&ts_language)
        .map_err(|err| GraphError::Parse {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
    let tree = parser.parse(source, None).ok_or_else(|| GraphError::Parse {
        path: path.to_path_buf(),
        reason: "tree-sitter produced no syntax tree".to_string(),
    })?;

    let root = tree.root_node();
    let source = source.as_bytes();
    let aliases = service_aliases(root, source);

    let mut imports = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        match node.kind() {
            "import_statement" => {
                if let Some(specifier) = import_source(node, source) {
                    let kind = if is_type_only(node, source) {
                        ImportKind::TypeOnly
                    } else {
                        ImportKind::Static
                    };
                    imports.push(statement(specifier, kind, node));
                }
                continue;
            }
            "export_statement" => {
                if let Some(specifier) = node
                    .child_by_field_name("source")
                    .and_then(|n| string_value(n, source))
                {
                    let kind = if is_type_only(node, source) {
                        ImportKind::TypeOnly
                    } else {
                        ImportKind::ReExport
                    };
                    imports.push(statement(specifier, kind, node));
                    continue;
                }
            }
            "decorator" => {
                if let Some(service) = decorator_service(node, source, &aliases) {
                    imports.push(statement(service, ImportKind::Service, node));
                    continue;
                }
            }
            "call_expression" => {
                if let Some((specifier, kind)) = call_import(node, source, &aliases) {
                    imports.push(statement(specifier, kind, node));
                }
            }
            _ => {}
        }

        // Reverse so the next pop is the first child: document order
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }

    Ok(imports)
}

fn statement(specifier: String, kind: ImportKind, node: Node) -> ImportStatement {
    ImportStatement {
        specifier,
        kind,
        range: SourceRange {
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            start_line: node.start_position().row + 1,
            end_line: node.end_position().row + 1,
        },
    }
}

/// `import ... from 'x'`, `import 'x'`, or TS `import x = require('x')`
fn import_source(node: Node, source: &[u8]) -> Option<String> {
    if let Some(specifier) = node
        .child_by_field_name("source")
        .and_then(|n| string_value(n, source))
    {
        return Some(specifier);
    }
    let mut cursor = node.walk();
    let require_clause = node
        .named_children(&mut cursor)
        .find(|child| child.kind() == "import_require_clause")?;
    require_clause
        .child_by_field_name("source")
        .and_then(|n| string_value(n, source))
}

fn is_type_only(node: Node, source: &[u8]) -> bool {
    node.utf8_text(source)
        .map(|text| {
            let text = text.trim_start();
            text.starts_with("import type ") || text.starts_with("export type ")
        })
        .unwrap_or(false)
}

/// Literal value of a string or substitution-free template string
fn string_value(node: Node, source: &[u8]) -> Option<String> {
    let text = node.utf8_text(source).ok()?;
    let value = match node.kind() {
        "string" => text.trim_matches(|c| c == '"' || c == '\''),
        "template_string" if !text.contains("${") => text.trim_matches('`'),
        _ => return None,
    };
    (!value.is_empty()).then(|| value.to_string())
}

fn first_argument<'t>(call: Node<'t>) -> Option<Node<'t>> {
    let arguments = call.child_by_field_name("arguments")?;
    let mut cursor = arguments.walk();
    let first = arguments.named_children(&mut cursor).next();
    first
}

/// Local names bound to `service`/`inject` from `@ember/service`
fn service_aliases(root: Node, source: &[u8]) -> HashSet<String> {
    let mut aliases = HashSet::new();
    let mut cursor = root.walk();
    for statement in root.named_children(&mut cursor) {
        if statement.kind() != "import_statement" {
            continue;
        }
        if import_source(statement, source).as_deref() != Some(EMBER_SERVICE_MODULE) {
            continue;
        }
        let mut stack = vec![statement];
        while let Some(node) = stack.pop() {
            if node.kind() == "import_specifier" {
                let imported = node
                    .child_by_field_name("name")
                    .and_then(|n| n.utf8_text(source).ok());
                let local = node
                    .child_by_field_name("alias")
                    .and_then(|n| n.utf8_text(source).ok())
                    .or(imported);
                if let (Some(imported), Some(local)) = (imported, local) {
                    if SERVICE_EXPORTS.contains(&imported) {
                        aliases.insert(local.to_string());
                    }
                }
                continue;
            }
            let mut inner = node.walk();
            stack.extend(node.named_children(&mut inner));
        }
    }
    aliases
}

/// `@service foo`, `@service('name') foo`, `@inject() fooBar`
fn decorator_service(node: Node, source: &[u8], aliases: &HashSet<String>) -> Option<String> {
    let expression = {
        let mut cursor = node.walk();
        let first = node.named_children(&mut cursor).next();
        first?
    };
    let (callee, call) = match expression.kind() {
        "identifier" => (expression, None),
        "call_expression" => (expression.child_by_field_name("function")?, Some(expression)),
        _ => return None,
    };
    let callee_name = callee.utf8_text(source).ok()?;
    if callee.kind() != "identifier" || !aliases.contains(callee_name) {
        return None;
    }

    if let Some(name) = call.and_then(first_argument).and_then(|arg| string_value(arg, source)) {
        return Some(name);
    }

    // Field decorators sit inside the field; method-style ones precede it
    let field = node
        .parent()
        .filter(|parent| parent.kind() != "class_body")
        .or_else(|| node.next_named_sibling())?;
    let name = field
        .child_by_field_name("name")
        .or_else(|| field.child_by_field_name("property"))?;
    Some(dasherize(name.utf8_text(source).ok()?))
}

/// `require('x')`, `import('x')`, `foo: service()`, `owner.lookup('service:x')`
fn call_import(node: Node, source: &[u8], aliases: &HashSet<String>) -> Option<(String, ImportKind)> {
    let function = node.child_by_field_name("function")?;
    match function.kind() {
        "import" => {
            let specifier = first_argument(node).and_then(|arg| string_value(arg, source))?;
            Some((specifier, ImportKind::Dynamic))
        }
        "identifier" => {
            let name = function.utf8_text(source).ok()?;
            if name == "require" {
                let specifier = first_argument(node).and_then(|arg| string_value(arg, source))?;
                return Some((specifier, ImportKind::Require));
            }
            if !aliases.contains(name) || node.parent().is_some_and(|p| p.kind() == "decorator") {
                return None;
            }
            let service = match first_argument(node).and_then(|arg| string_value(arg, source)) {
                Some(explicit) => explicit,
                None => {
                    let pair = node.parent().filter(|p| p.kind() == "pair")?;
                    let key = pair.child_by_field_name("key")?;
                    let key = string_value(key, source).or_else(|| key.utf8_text(source).ok().map(str::to_string))?;
                    dasherize(&key)
                }
            };
            Some((service, ImportKind::Service))
        }
        "member_expression" => {
            let property = function.child_by_field_name("property")?;
            if property.utf8_text(source).ok()? != "lookup" {
                return None;
            }
            let target = first_argument(node).and_then(|arg| string_value(arg, source))?;
            let service = target.strip_prefix(SERVICE_LOOKUP_PREFIX)?;
            Some((service.to_string(), ImportKind::Service))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str, language: Language) -> Vec<(String, ImportKind)> {
        extract_imports(source, language, Path::new("test.ts"))
            .unwrap()
            .into_iter()
            .map(|i| (i.specifier, i.kind))
            .collect()
    }

    fn specs(items: &[(&str, ImportKind)]) -> Vec<(String, ImportKind)> {
        items.iter().map(|(s, k)| (s.to_string(), *k)).collect()
    }

    #[test]
    fn test_es_imports_in_source_order() {
        let source = r#"
import Component from '@glimmer/component';
import { tracked } from "@glimmer/tracking";
import './side-effect';
import type { Model } from '../models/user';
export { helper } from './helpers/format';
export * from './utils';
export type { Shape } from './shape';
"#;
        assert_eq!(
            parse(source, Language::TypeScript),
            specs(&[
                ("@glimmer/component", ImportKind::Static),
                ("@glimmer/tracking", ImportKind::Static),
                ("./side-effect", ImportKind::Static),
                ("../models/user", ImportKind::TypeOnly),
                ("./helpers/format", ImportKind::ReExport),
                ("./utils", ImportKind::ReExport),
                ("./shape", ImportKind::TypeOnly),
            ])
        );
    }

    #[test]
    fn test_commonjs_and_dynamic_imports() {
        let source = r#"
const path = require('path');
const { helper } = require(`./helper`);
async function load() {
  const mod = await import('./lazy');
  return mod;
}
const notStatic = require(name);
"#;
        assert_eq!(
            parse(source, Language::JavaScript),
            specs(&[
                ("path", ImportKind::Require),
                ("./helper", ImportKind::Require),
                ("./lazy", ImportKind::Dynamic),
            ])
        );
    }

    #[test]
    fn test_typescript_import_equals_require() {
        let source = "import fs = require('fs');\n";
        assert_eq!(parse(source, Language::TypeScript), specs(&[("fs", ImportKind::Static)]));
    }

    #[test]
    fn test_decorator_service_injection() {
        let source = r#"
import Component from '@glimmer/component';
import { service } from '@ember/service';

export default class Profile extends Component {
  @service declare session: unknown;
  @service('current-user') declare user: unknown;
  @service declare flashMessages: unknown;
}
"#;
        assert_eq!(
            parse(source, Language::TypeScript),
            specs(&[
                ("@glimmer/component", ImportKind::Static),
                ("@ember/service", ImportKind::Static),
                ("session", ImportKind::Service),
                ("current-user", ImportKind::Service),
                ("flash-messages", ImportKind::Service),
            ])
        );
    }

    #[test]
    fn test_aliased_inject_in_javascript() {
        let source = r#"
import Route from '@ember/routing/route';
import { inject as service } from '@ember/service';

export default class IndexRoute extends Route {
  @service store;
  @service() router;
}
"#;
        assert_eq!(
            parse(source, Language::JavaScript),
            specs(&[
                ("@ember/routing/route", ImportKind::Static),
                ("@ember/service", ImportKind::Static),
                ("store", ImportKind::Service),
                ("router", ImportKind::Service),
            ])
        );
    }

    #[test]
    fn test_classic_service_injection() {
        let source = r#"
import Controller from '@ember/controller';
import { inject } from '@ember/service';

export default Controller.extend({
  session: inject(),
  currentUser: inject(),
  cart: inject('shopping-cart'),
});
"#;
        let services: Vec<_> = parse(source, Language::JavaScript)
            .into_iter()
            .filter(|(_, k)| *k == ImportKind::Service)
            .map(|(s, _)| s)
            .collect();
        assert_eq!(services, vec!["session", "current-user", "shopping-cart"]);
    }

    #[test]
    fn test_owner_lookup() {
        let source = r#"
import { module, test } from 'qunit';
test('it exists', function (assert) {
  const service = this.owner.lookup('service:feature-flags');
  const route = this.owner.lookup('route:index');
  assert.ok(service && route);
});
"#;
        assert_eq!(
            parse(source, Language::JavaScript),
            specs(&[
                ("qunit", ImportKind::Static),
                ("feature-flags", ImportKind::Service),
            ])
        );
    }

    #[test]
    fn test_service_without_ember_import_is_ignored() {
        let source = r#"
import { service } from './not-ember';
export default class Thing {
  @service session;
}
"#;
        assert_eq!(
            parse(source, Language::JavaScript),
            specs(&[("./not-ember", ImportKind::Static)])
        );
    }

    #[test]
    fn test_tsx_source() {
        let source = r#"
import React from 'react';
import { Button } from './button';
export const App = () => <Button label="hi" />;
"#;
        assert_eq!(
            parse(source, Language::Tsx),
            specs(&[("react", ImportKind::Static), ("./button", ImportKind::Static)])
        );
    }

    #[test]
    fn test_source_range_lines() {
        let source = "\n\nimport a from './a';\n";
        let imports = extract_imports(source, Language::TypeScript, Path::new("x.ts")).unwrap();
        assert_eq!(imports[0].range.start_line, 3);
        assert_eq!(imports[0].range.end_line, 3);
    }
}

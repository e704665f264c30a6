use std::collections::HashSet;

use outbreak_core::Item;

use crate::ast::{ItemDecl, PropertyValue, Span, Spanned};
use crate::compiler::{compile_effect, compile_predicate};
use crate::diagnostics::Diagnostic;
use crate::lexer;
use crate::parser;

/// Result of compiling a catalog definition file.
#[derive(Debug, Clone, Default)]
pub struct CatalogResult {
    /// Items in file order. Only complete when there are no errors.
    pub items: Vec<Item>,
    /// Diagnostics with spans into the catalog file.
    pub diagnostics: Vec<Diagnostic>,
}

impl CatalogResult {
    /// Whether any diagnostic is an error.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Compile catalog source text into item records, checking that every
/// effect and predicate compiles.
pub fn compile_catalog(source: &str) -> CatalogResult {
    let (tokens, lex_errors) = lexer::lex(source);
    let mut result = CatalogResult {
        items: Vec::new(),
        diagnostics: lex_errors
            .into_iter()
            .map(|e| Diagnostic::error(e.span, e.message))
            .collect(),
    };

    let file = match parser::parse_catalog(&tokens) {
        Ok(file) => file,
        Err(errors) => {
            result.diagnostics.extend(
                errors
                    .into_iter()
                    .map(|e| Diagnostic::error(e.span, e.message)),
            );
            return result;
        }
    };

    let mut seen = HashSet::new();
    for decl in &file.items {
        if !seen.insert(decl.node.id.node.clone()) {
            result.diagnostics.push(
                Diagnostic::error(
                    decl.node.id.span.clone(),
                    format!("item `{}` is defined twice", decl.node.id.node),
                )
                .with_label("duplicate id"),
            );
            continue;
        }
        if let Some(item) = lower_item(source, decl, &mut result.diagnostics) {
            result.items.push(item);
        }
    }
    result
}

#[derive(Default)]
struct Draft {
    name: Option<String>,
    description: Option<String>,
    total: Option<u32>,
    in_stock: Option<(u32, Span)>,
    uses: Option<u32>,
    unlocked: Option<bool>,
    effect: Option<String>,
    predicate: Option<String>,
}

fn lower_item(source: &str, decl: &Spanned<ItemDecl>, diagnostics: &mut Vec<Diagnostic>) -> Option<Item> {
    let id = &decl.node.id.node;
    let errors_before = diagnostics.iter().filter(|d| d.is_error()).count();
    let mut draft = Draft::default();
    let mut keys = HashSet::new();

    for prop in &decl.node.properties {
        let key = &prop.node.key;
        if !keys.insert(key.node.as_str()) {
            diagnostics.push(Diagnostic::error(
                key.span.clone(),
                format!("`{}` is set twice on `{id}`", key.node),
            ));
            continue;
        }
        let value = &prop.node.value;
        let span = prop.span.clone();
        match key.node.as_str() {
            "name" => draft.name = expect_str(value, &span, diagnostics),
            "description" => draft.description = expect_str(value, &span, diagnostics),
            "total" => draft.total = expect_count(value, &span, diagnostics),
            "in_stock" => {
                draft.in_stock = expect_count(value, &span, diagnostics).map(|n| (n, span.clone()))
            }
            "uses" => draft.uses = expect_count(value, &span, diagnostics),
            "unlocked" => draft.unlocked = expect_bool(value, &span, diagnostics),
            "effect" => {
                draft.effect = expect_body(source, value, &span, diagnostics).map(|(text, offset)| {
                    let compiled = compile_effect(text);
                    diagnostics.extend(compiled.diagnostics.into_iter().map(|d| d.shifted(offset)));
                    dedent(text)
                })
            }
            "predicate" => {
                draft.predicate = expect_body(source, value, &span, diagnostics).map(|(text, offset)| {
                    let compiled = compile_predicate(text);
                    diagnostics.extend(compiled.diagnostics.into_iter().map(|d| d.shifted(offset)));
                    dedent(text)
                })
            }
            other => diagnostics.push(
                Diagnostic::error(key.span.clone(), format!("unknown item property `{other}`"))
                    .with_label("expected name, description, total, in_stock, uses, unlocked, effect or predicate"),
            ),
        }
    }

    let Some(effect) = draft.effect else {
        diagnostics.push(Diagnostic::error(
            decl.node.id.span.clone(),
            format!("item `{id}` has no effect"),
        ));
        return None;
    };
    if diagnostics.iter().filter(|d| d.is_error()).count() > errors_before {
        return None;
    }

    let total = draft.total.unwrap_or(0);
    let mut item = Item::new(id.clone(), draft.name.unwrap_or_else(|| id.clone()), total, effect)
        .with_description(draft.description.unwrap_or_default())
        .with_uses(draft.uses.unwrap_or(1))
        .unlocked(draft.unlocked.unwrap_or(false));
    if let Some((in_stock, span)) = draft.in_stock {
        if in_stock > total {
            diagnostics.push(Diagnostic::warning(
                span,
                format!("in_stock {in_stock} exceeds total {total}; clamped"),
            ));
        }
        item.in_stock = in_stock.min(total);
    }
    if let Some(predicate) = draft.predicate.filter(|p| !p.trim().is_empty()) {
        item = item.with_predicate(predicate);
    }
    Some(item)
}

fn wrong_kind(span: &Span, expected: &str, diagnostics: &mut Vec<Diagnostic>) {
    diagnostics.push(Diagnostic::error(span.clone(), format!("expected {expected}")));
}

fn expect_str(value: &PropertyValue, span: &Span, diagnostics: &mut Vec<Diagnostic>) -> Option<String> {
    match value {
        PropertyValue::Str(s) => Some(s.clone()),
        _ => {
            wrong_kind(span, "a string", diagnostics);
            None
        }
    }
}

fn expect_count(value: &PropertyValue, span: &Span, diagnostics: &mut Vec<Diagnostic>) -> Option<u32> {
    match value {
        PropertyValue::Integer(n) => match u32::try_from(*n) {
            Ok(n) => Some(n),
            Err(_) => {
                wrong_kind(span, "a count between 0 and 4294967295", diagnostics);
                None
            }
        },
        _ => {
            wrong_kind(span, "an integer", diagnostics);
            None
        }
    }
}

fn expect_bool(value: &PropertyValue, span: &Span, diagnostics: &mut Vec<Diagnostic>) -> Option<bool> {
    match value {
        PropertyValue::Boolean(b) => Some(*b),
        _ => {
            wrong_kind(span, "`true` or `false`", diagnostics);
            None
        }
    }
}

/// Text between the braces and its byte offset in the file.
fn expect_body<'s>(
    source: &'s str,
    value: &PropertyValue,
    span: &Span,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<(&'s str, usize)> {
    match value {
        PropertyValue::Body(braces) => {
            let inner = braces.start + 1..braces.end.saturating_sub(1);
            source.get(inner.clone()).map(|text| (text, inner.start))
        }
        _ => {
            wrong_kind(span, "a `{ ... }` script body", diagnostics);
            None
        }
    }
}

/// Strip blank edge lines and the common leading indentation.
pub fn dedent(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let first = lines.iter().position(|l| !l.trim().is_empty());
    let last = lines.iter().rposition(|l| !l.trim().is_empty());
    let (Some(first), Some(last)) = (first, last) else {
        return String::new();
    };
    let body = &lines[first..=last];
    let indent = body
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    body.iter()
        .map(|l| l.get(indent..).unwrap_or("").trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

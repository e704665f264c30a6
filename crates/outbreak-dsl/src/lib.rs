//! The item script language.
//!
//! Catalog files declare items; each item carries an `effect` script that
//! runs when the item is used and an optional `predicate` that gates buying
//! and using it. Scripts are lexed with logos, parsed with chumsky, checked
//! and lowered by [`compiler`], and evaluated by [`interpreter`].

/// Syntax tree produced by the parser.
pub mod ast;
/// Catalog file compilation.
pub mod catalog;
/// Type checking and lowering.
pub mod compiler;
/// Diagnostics and their ariadne rendering.
pub mod diagnostics;
/// Error types.
pub mod error;
pub mod interpreter;
/// Tokenizer.
pub mod lexer;
/// chumsky grammar.
pub mod parser;
pub mod program;
/// Runtime values and static types.
pub mod value;

use std::path::Path;

use outbreak_core::Item;

pub use catalog::{CatalogResult, compile_catalog};
pub use compiler::{CompileResult, compile_effect, compile_predicate};
pub use diagnostics::{Diagnostic, Severity, render_diagnostics};
pub use error::{EffectError, EffectResult, ScriptDefinitionError, ScriptPart};
pub use interpreter::{Host, pick_weighted};
pub use program::{Effect, Predicate};
pub use value::{Answer, AskKind, Reply, Value};

/// Read and compile a catalog file. Read failures become diagnostics.
pub fn compile_catalog_file(path: &Path) -> (String, CatalogResult) {
    match std::fs::read_to_string(path) {
        Ok(source) => {
            let result = compile_catalog(&source);
            (source, result)
        }
        Err(e) => (
            String::new(),
            CatalogResult {
                items: Vec::new(),
                diagnostics: vec![Diagnostic::error(
                    0..0,
                    format!("cannot read {}: {e}", path.display()),
                )],
            },
        ),
    }
}

/// Compile a catalog, failing with every diagnostic when anything is wrong.
pub fn load_catalog(name: &str, source: &str) -> Result<Vec<Item>, ScriptDefinitionError> {
    let result = compile_catalog(source);
    if result.has_errors() {
        return Err(ScriptDefinitionError {
            item: name.to_owned(),
            part: ScriptPart::Catalog,
            script: source.to_owned(),
            diagnostics: result.diagnostics,
        });
    }
    Ok(result.items)
}

/// Compile the scripts stored on an item record.
pub fn compile_item(item: &Item) -> Result<(Effect, Predicate), ScriptDefinitionError> {
    let failed = |part, script: &str, diagnostics| ScriptDefinitionError {
        item: item.id.clone(),
        part,
        script: script.to_owned(),
        diagnostics,
    };

    let effect = compile_effect(&item.effect);
    let Some(effect_program) = effect.program else {
        return Err(failed(ScriptPart::Effect, &item.effect, effect.diagnostics));
    };

    let predicate_source = item.predicate.as_deref().unwrap_or("");
    let predicate = compile_predicate(predicate_source);
    let Some(predicate_program) = predicate.program else {
        return Err(failed(ScriptPart::Predicate, predicate_source, predicate.diagnostics));
    };

    Ok((effect_program, predicate_program))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn compile_item_reports_part() {
        let item = Item::new("soap", "Soap", 1, "pass").with_predicate("sickness + 1");
        let err = compile_item(&item).unwrap_err();
        assert_eq!(err.part, ScriptPart::Predicate);
        assert_eq!(err.item, "soap");

        let item = Item::new("soap", "Soap", 1, "sickness = true");
        assert_eq!(compile_item(&item).unwrap_err().part, ScriptPart::Effect);
    }

    #[test]
    fn compile_item_accepts_missing_predicate() {
        let item = Item::new("soap", "Soap", 1, "sickness = sickness - 2");
        let (_, predicate) = compile_item(&item).unwrap();
        assert_eq!(predicate, Predicate::always());
    }

    #[test]
    fn load_catalog_fails_as_a_whole() {
        let err = load_catalog("bad.items", "item soap { effect { teleport() } }").unwrap_err();
        assert_eq!(err.part, ScriptPart::Catalog);
        assert!(err.to_string().contains("unknown function `teleport`"));
    }

    #[test]
    fn catalog_file_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "item soap {{\n    effect {{ pass }}\n}}").unwrap();
        let (source, result) = compile_catalog_file(file.path());
        assert!(source.contains("item soap"));
        assert_eq!(result.items.len(), 1);
    }

    #[test]
    fn missing_catalog_file_is_a_diagnostic() {
        let (_, result) = compile_catalog_file(Path::new("/nonexistent/default.items"));
        assert!(result.has_errors());
        assert!(result.diagnostics[0].message.contains("cannot read"));
    }
}

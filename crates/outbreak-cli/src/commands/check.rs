use std::path::Path;

use comfy_table::{ContentArrangement, Table};

pub fn run(catalog: &Path) -> Result<(), String> {
    let (source, result) = outbreak_dsl::compile_catalog_file(catalog);
    super::print_diagnostics(&source, &catalog.display().to_string(), &result.diagnostics);

    if result.has_errors() {
        return Err("catalog failed to compile".into());
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Item", "Name", "Total", "Uses", "Unlocked", "Predicate"]);
    for item in &result.items {
        table.add_row(vec![
            item.id.clone(),
            item.name.clone(),
            item.total.to_string(),
            if item.is_special() { "special".to_string() } else { item.uses.to_string() },
            if item.unlocked { "yes" } else { "no" }.to_string(),
            if item.predicate.is_some() { "yes" } else { "—" }.to_string(),
        ]);
    }

    println!("{table}");
    println!();
    println!("  All checks passed for '{}'.", catalog.display());
    println!("  {} items", result.items.len());

    Ok(())
}

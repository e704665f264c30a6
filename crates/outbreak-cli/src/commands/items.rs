use colored::Colorize;
use comfy_table::{ContentArrangement, Table};
use outbreak_simulation::RestockMode;

use super::Session;

pub async fn list(session: &Session) -> Result<(), String> {
    let service = session.open().await?;
    let items = service.items().await;

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Item", "In stock", "Total", "Unlocked", "Uses"]);
    for item in &items {
        table.add_row(vec![
            item.id.clone(),
            item.in_stock.to_string(),
            item.total.to_string(),
            item.unlocked.to_string(),
            item.uses.to_string(),
        ]);
    }

    println!("{table}");
    println!();
    println!("  {} items", items.len());
    Ok(())
}

pub async fn restock(session: &Session, ids: &[String], mode: RestockMode) -> Result<(), String> {
    let service = session.open().await?;
    let report = service.restock(ids, mode).await.map_err(|e| e.to_string())?;

    for (id, found) in &report {
        if *found {
            println!("  {}  {id}", "OK".green().bold());
        } else {
            println!("  {}  {id} (not found)", "MISSING".yellow().bold());
        }
    }
    Ok(())
}

pub async fn refresh(session: &Session) -> Result<(), String> {
    let service = session.open().await?;
    let added = service.refresh_catalog().await.map_err(|e| e.to_string())?;

    match added {
        0 => println!("  Catalog is up to date."),
        1 => println!("  Added 1 new item."),
        n => println!("  Added {n} new items."),
    }
    Ok(())
}

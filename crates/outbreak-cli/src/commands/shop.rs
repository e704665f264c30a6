use colored::Colorize;
use comfy_table::{ContentArrangement, Table};
use outbreak_core::{ParticipantId, VenueId};

use super::Session;

pub async fn list(session: &Session, member: ParticipantId) -> Result<(), String> {
    let service = session.open().await?;
    let items = service.shop(member).await.map_err(|e| e.to_string())?;

    println!("  {}", "Item Shop".bold().underline());
    println!();
    if items.is_empty() {
        println!("  Nothing to see here.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Item", "Name", "In stock", "Description"]);
    for item in &items {
        let desc = if item.description.is_empty() {
            "—".to_string()
        } else {
            item.description.clone()
        };
        table.add_row(vec![item.id.clone(), item.name.clone(), item.in_stock.to_string(), desc]);
    }

    println!("{table}");
    Ok(())
}

pub async fn buy(session: &Session, member: ParticipantId, item: &str, venue: VenueId) -> Result<(), String> {
    let service = session.open().await?;
    let item = service.buy(member, item, venue).await.map_err(|e| e.to_string())?;

    println!(
        "  {} bought {} ({} left in stock)",
        session.name_of(member),
        item.name.bold(),
        item.in_stock
    );
    Ok(())
}

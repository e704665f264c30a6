use colored::Colorize;
use comfy_table::{ContentArrangement, Table};
use outbreak_core::{ParticipantId, VenueId};

use super::Session;

pub async fn list(session: &Session, member: ParticipantId) -> Result<(), String> {
    let service = session.open().await?;
    let entries = service.backpack(member).await.map_err(|e| e.to_string())?;

    println!("  {}", format!("{}'s backpack", session.name_of(member)).bold().underline());
    println!();
    if entries.is_empty() {
        println!("  Empty.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Item", "Name", "Uses left"]);
    for entry in &entries {
        let remaining = if entry.is_special() {
            "special".to_string()
        } else {
            entry.remaining.to_string()
        };
        table.add_row(vec![entry.item.id.clone(), entry.item.name.clone(), remaining]);
    }

    println!("{table}");
    Ok(())
}

pub async fn use_item(session: &Session, member: ParticipantId, item: &str, venue: VenueId) -> Result<(), String> {
    let service = session.open().await?;
    let signal = service.use_item(member, item, venue).await.map_err(|e| e.to_string())?;

    println!("  {} used {item}: {}", session.name_of(member), super::signal_label(signal));
    Ok(())
}

use colored::Colorize;
use comfy_table::{ContentArrangement, Table};

use super::Session;

pub async fn totals(session: &Session) -> Result<(), String> {
    let service = session.open().await?;
    let report = service.stats().await;

    println!("  {}", "Outbreak".bold().underline());
    println!();
    println!("  {:<20} {}", "Total participants", report.participants);
    println!("  {:<20} {}", "Dead", report.stats.dead);
    println!("  {:<20} {}", "Infected", report.active_infections());
    println!("  {:<20} {}", "Healers", report.stats.healers);
    println!("  {:<20} {}", "Cured", report.stats.cured);
    Ok(())
}

pub async fn rates(session: &Session) -> Result<(), String> {
    let service = session.open().await?;
    let rates = service.venue_rates().await;

    if rates.is_empty() {
        println!("  No venue activity.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Venue", "Transmission"]);
    for (venue, rate) in &rates {
        table.add_row(vec![venue.to_string(), format!("{:.3}%", rate * 100.0)]);
    }

    println!("{table}");
    Ok(())
}

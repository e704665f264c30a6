use colored::Colorize;
use outbreak_core::{DEATH_THRESHOLD, ParticipantId};

use super::Session;

pub async fn run(session: &Session, member: ParticipantId) -> Result<(), String> {
    let service = session.open().await?;
    let participant = service.participant(member).await.map_err(|e| e.to_string())?;

    let mut badges = Vec::new();
    if participant.is_dead() {
        badges.push("dead".red().bold().to_string());
    }
    if participant.masked() {
        badges.push("masked".to_string());
    }
    if participant.is_infectious() {
        badges.push("infectious".yellow().to_string());
    }
    if participant.healer() {
        badges.push("healer".cyan().to_string());
    }
    if participant.immunocompromised() {
        badges.push("immunocompromised".magenta().to_string());
    }

    println!("  {}", session.name_of(member).bold().underline());
    println!();
    println!("  {:<16} [{}/{DEATH_THRESHOLD}]", "Sickness", participant.sickness());
    println!(
        "  {:<16} {}",
        "Badges",
        if badges.is_empty() { "none".to_string() } else { badges.join(" ") }
    );
    let backpack: Vec<&str> = participant.backpack().keys().map(String::as_str).collect();
    println!(
        "  {:<16} {}",
        "Backpack",
        if backpack.is_empty() { "empty".to_string() } else { backpack.join(" ") }
    );
    match (participant.death(), participant.infected_since()) {
        (Some(death), _) => println!("  {:<16} {}", "Dead since", death.to_rfc3339()),
        (None, Some(since)) => println!("  {:<16} {}", "Infected since", since.to_rfc3339()),
        (None, None) => {}
    }
    Ok(())
}

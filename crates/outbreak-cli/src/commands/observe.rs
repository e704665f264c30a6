use outbreak_core::{ParticipantId, VenueId};

use super::Session;

pub async fn run(session: &Session, venue: VenueId, members: &[ParticipantId]) -> Result<(), String> {
    let service = session.open().await?;

    let mut changed = 0;
    for member in members {
        let transition = service
            .observe_message(venue, *member)
            .await
            .map_err(|e| e.to_string())?;
        if let Some(transition) = transition {
            println!("  {:<10} {}", super::transition_label(transition), session.name_of(*member));
            changed += 1;
        }
    }

    let rate = service
        .venue_rates()
        .await
        .into_iter()
        .find_map(|(v, rate)| (v == venue).then_some(rate))
        .unwrap_or(0.0);
    println!();
    println!(
        "  {} messages in {venue}, {changed} state changes, transmission rate {:.3}%",
        members.len(),
        rate * 100.0
    );
    Ok(())
}

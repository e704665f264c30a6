use outbreak_core::ParticipantId;
use outbreak_simulation::AdminAction;

use super::Session;

pub async fn force(session: &Session, action: AdminAction, member: ParticipantId) -> Result<(), String> {
    let service = session.open().await?;
    let changed = service.force(member, action).await.map_err(|e| e.to_string())?;

    if !changed {
        println!("  Nothing changed for {}.", session.name_of(member));
    }
    Ok(())
}

pub async fn announce(session: &Session, text: &str) -> Result<(), String> {
    if text.trim().is_empty() {
        return Err("announcement is empty".into());
    }
    let service = session.open().await?;
    service.announce(text).await;
    Ok(())
}

use colored::Colorize;
use outbreak_simulation::CycleReport;
use tracing::info;

use super::Session;

pub async fn start(session: &Session) -> Result<(), String> {
    let service = session.open().await?;
    let report = service.begin_epidemic().await.map_err(|e| e.to_string())?;

    println!();
    println!("  {}", "The epidemic has begun.".bold());
    print_report(session, &report);
    Ok(())
}

/// Run the cycle if it is due, or unconditionally with `force`.
pub async fn run(session: &Session, force: bool) -> Result<(), String> {
    let service = session.open().await?;
    let report = if force {
        Some(service.force_cycle().await.map_err(|e| e.to_string())?)
    } else {
        service.run_due_cycle().await.map_err(|e| e.to_string())?
    };

    match report {
        Some(report) => {
            println!();
            println!("  {}", "Day cycle".bold().underline());
            print_report(session, &report);
        }
        None => match service.next_cycle() {
            Some(next) => println!("  No cycle due. Next cycle at {}.", next.to_rfc3339()),
            None => println!("  The epidemic has not started."),
        },
    }
    Ok(())
}

/// Keep the scheduler running until Ctrl-C, then flush and exit.
pub async fn daemon(session: &Session) -> Result<(), String> {
    let service = session.open().await?;
    service.start_scheduler();
    match service.next_cycle() {
        Some(next) => println!("  Scheduler running. Next cycle at {}.", next.to_rfc3339()),
        None => println!("  Scheduler running. Waiting for the epidemic to start."),
    }

    tokio::signal::ctrl_c().await.map_err(|e| e.to_string())?;
    info!("interrupt received");
    service.shutdown().await.map_err(|e| e.to_string())?;
    println!("  Scheduler stopped.");
    Ok(())
}

fn print_report(session: &Session, report: &CycleReport) {
    let names = |members: &[outbreak_core::ParticipantId]| {
        members.iter().map(|m| session.name_of(*m)).collect::<Vec<_>>().join(", ")
    };

    if !report.recruited.infected.is_empty() {
        println!("  {:<12} {}", "Infected".yellow(), names(&report.recruited.infected));
    }
    if !report.recruited.healers.is_empty() {
        println!("  {:<12} {}", "Healers".cyan(), names(&report.recruited.healers));
    }
    if report.recruited.is_empty() {
        println!("  {}", "No one was recruited.".dimmed());
    }
    if report.progressed > 0 {
        println!("  {:<12} {}", "Progressed", report.progressed);
    }
    if !report.died.is_empty() {
        println!("  {:<12} {}", "Died".red().bold(), names(&report.died));
    }
    if let Some(next) = report.next_cycle {
        println!("  {:<12} {}", "Next cycle", next.to_rfc3339());
    }
    println!();
}

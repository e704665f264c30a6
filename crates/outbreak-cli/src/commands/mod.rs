pub mod backpack;
pub mod check;
pub mod cycle;
pub mod gm;
pub mod info;
pub mod items;
pub mod observe;
pub mod shop;
pub mod stats;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use colored::Colorize;
use outbreak_core::{ParticipantId, Signal};
use outbreak_dsl::diagnostics::count as diagnostic_count;
use outbreak_dsl::{Diagnostic, render_diagnostics};
use outbreak_simulation::{EpidemicService, SystemClock, Transition};

use crate::console::{Console, ConsoleConfig};

/// Settings shared by every command that touches the game state.
pub struct Session {
    pub config: ConsoleConfig,
    console: Arc<Console>,
}

impl Session {
    pub fn load(config_path: &Path, data: Option<PathBuf>) -> Result<Self, String> {
        let mut config = ConsoleConfig::load(config_path).map_err(|e| e.to_string())?;
        if let Some(data) = data {
            config.epidemic.data_file = data;
        }
        let console = Console::new(&config);
        Ok(Self { config, console })
    }

    /// Open the service and warm the venue windows from the roster.
    pub async fn open(&self) -> Result<Arc<EpidemicService>, String> {
        let service = EpidemicService::open(
            self.config.epidemic.clone(),
            self.console.collaborators(),
            Arc::new(SystemClock),
        )
        .await
        .map_err(|e| e.to_string())?;
        service.warm_venues().await;
        Ok(service)
    }

    pub fn name_of(&self, member: ParticipantId) -> String {
        self.config.roster.name_of(member)
    }
}

/// Print diagnostics to stderr using ariadne.
fn print_diagnostics(source: &str, filename: &str, diagnostics: &[Diagnostic]) {
    if diagnostics.is_empty() {
        return;
    }

    let rendered = render_diagnostics(source, filename, diagnostics);
    eprint!("{rendered}");

    let (errors, warnings) = diagnostic_count(diagnostics);

    if errors > 0 {
        eprintln!(
            "  {} error{}, {} warning{}",
            errors,
            if errors == 1 { "" } else { "s" },
            warnings,
            if warnings == 1 { "" } else { "s" },
        );
    } else if warnings > 0 {
        eprintln!("  {} warning{}", warnings, if warnings == 1 { "" } else { "s" });
    }
}

fn transition_label(transition: Transition) -> colored::ColoredString {
    match transition {
        Transition::Infected => "INFECTED".yellow().bold(),
        Transition::Died => "DEAD".red().bold(),
        Transition::Cured => "CURED".green().bold(),
        Transition::BecameHealer => "HEALER".cyan().bold(),
    }
}

fn signal_label(signal: Signal) -> colored::ColoredString {
    match signal {
        Signal::Alive => "alive".normal(),
        Signal::Dead => "dead".red().bold(),
        Signal::AlreadyDead => "already dead".red(),
        Signal::Cured => "cured".green().bold(),
        Signal::BecameHealer => "healer".cyan().bold(),
    }
}

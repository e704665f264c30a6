//! Command-line driver for the Outbreak epidemic game.

mod commands;
mod console;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use outbreak_core::{ParticipantId, VenueId};
use outbreak_simulation::{AdminAction, RestockMode};
use tracing_subscriber::EnvFilter;

use commands::Session;

#[derive(Parser)]
#[command(
    name = "outbreak",
    about = "Outbreak: a chat-community epidemic game",
    version,
    propagate_version = true
)]
struct Cli {
    /// Game state file (overrides `data_file` from the config)
    #[arg(short, long, global = true)]
    data: Option<PathBuf>,

    /// YAML configuration file
    #[arg(short, long, global = true, default_value = "outbreak.yml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile an item catalog and report diagnostics
    Check {
        /// Catalog definition file
        catalog: PathBuf,
    },

    /// Begin the epidemic: recruit the first infected and healers
    Start,

    /// Feed chat messages through the per-message epidemic step
    Observe {
        /// Venue the messages were sent in
        #[arg(short, long, default_value = "0")]
        venue: VenueId,

        /// Senders, in message order
        #[arg(required = true)]
        members: Vec<ParticipantId>,
    },

    /// List the items a member can buy
    Shop {
        member: ParticipantId,
    },

    /// Buy an item for a member
    Buy {
        member: ParticipantId,

        /// Item id
        item: String,

        /// Venue the purchase is made in
        #[arg(short, long, default_value = "0")]
        venue: VenueId,
    },

    /// Use an item from a member's backpack
    Use {
        member: ParticipantId,

        /// Item id
        item: String,

        /// Venue the item is used in
        #[arg(short, long, default_value = "0")]
        venue: VenueId,
    },

    /// Show a member's backpack
    Backpack {
        member: ParticipantId,
    },

    /// Show a member's condition
    Info {
        member: ParticipantId,
    },

    /// Show epidemic totals
    Stats,

    /// Show every catalog item with its stock and flags
    Items,

    /// Refill items to their totals
    Restock {
        /// Item ids
        #[arg(required = true)]
        items: Vec<String>,

        /// Also lock or unlock the items
        #[arg(short, long, value_enum, default_value_t = RestockArg::Restock)]
        mode: RestockArg,
    },

    /// Re-read the catalog file and append new items
    Refresh,

    /// Game master overrides
    Gm {
        #[arg(value_enum)]
        action: GmAction,

        member: ParticipantId,
    },

    /// Post an announcement to the event venue
    Announce {
        /// Announcement text
        #[arg(required = true)]
        text: Vec<String>,
    },

    /// Show the transmission rate of every monitored venue
    Rates,

    /// Run the day cycle if it is due
    Cycle {
        /// Run a cycle even if none is due yet
        #[arg(short, long)]
        force: bool,
    },

    /// Run the day-cycle scheduler until interrupted
    Run,
}

#[derive(Clone, Copy, ValueEnum)]
enum RestockArg {
    Restock,
    Unlock,
    Lock,
}

impl From<RestockArg> for RestockMode {
    fn from(arg: RestockArg) -> Self {
        match arg {
            RestockArg::Restock => RestockMode::Restock,
            RestockArg::Unlock => RestockMode::Unlock,
            RestockArg::Lock => RestockMode::Lock,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum GmAction {
    Infect,
    Heal,
    Kill,
    Cure,
}

impl From<GmAction> for AdminAction {
    fn from(action: GmAction) -> Self {
        match action {
            GmAction::Infect => AdminAction::Infect,
            GmAction::Heal => AdminAction::Heal,
            GmAction::Kill => AdminAction::Kill,
            GmAction::Cure => AdminAction::Cure,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check { catalog } => commands::check::run(&catalog),
        command => match Session::load(&cli.config, cli.data) {
            Ok(session) => dispatch(&session, command).await,
            Err(e) => Err(e),
        },
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

async fn dispatch(session: &Session, command: Commands) -> Result<(), String> {
    match command {
        Commands::Check { catalog } => commands::check::run(&catalog),
        Commands::Start => commands::cycle::start(session).await,
        Commands::Observe { venue, members } => commands::observe::run(session, venue, &members).await,
        Commands::Shop { member } => commands::shop::list(session, member).await,
        Commands::Buy { member, item, venue } => commands::shop::buy(session, member, &item, venue).await,
        Commands::Use { member, item, venue } => {
            commands::backpack::use_item(session, member, &item, venue).await
        }
        Commands::Backpack { member } => commands::backpack::list(session, member).await,
        Commands::Info { member } => commands::info::run(session, member).await,
        Commands::Stats => commands::stats::totals(session).await,
        Commands::Items => commands::items::list(session).await,
        Commands::Restock { items, mode } => commands::items::restock(session, &items, mode.into()).await,
        Commands::Refresh => commands::items::refresh(session).await,
        Commands::Gm { action, member } => commands::gm::force(session, action.into(), member).await,
        Commands::Announce { text } => commands::gm::announce(session, &text.join(" ")).await,
        Commands::Rates => commands::stats::rates(session).await,
        Commands::Cycle { force } => commands::cycle::run(session, force).await,
        Commands::Run => commands::cycle::daemon(session).await,
    }
}

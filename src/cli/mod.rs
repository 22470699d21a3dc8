pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Tally CLI - platform operations for the expense tracking API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[arg(
        long,
        global = true,
        default_value = "cli",
        help = "Actor recorded in the audit trail for every operation"
    )]
    pub actor: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Apply the database schema")]
    Init,

    #[command(about = "Load a YAML fixture into a fresh tenant")]
    Seed {
        #[arg(long, help = "Path to the fixture file")]
        file: std::path::PathBuf,
    },

    #[command(about = "Tenant lifecycle management")]
    Tenant {
        #[command(subcommand)]
        cmd: commands::tenant::TenantCommands,
    },

    #[command(about = "Budget and balance alert evaluation")]
    Alerts {
        #[command(subcommand)]
        cmd: commands::alerts::AlertCommands,
    },
}

#[derive(Debug, Clone)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let actor = cli.actor.clone();

    match cli.command {
        Commands::Init => commands::init::handle(output_format).await,
        Commands::Seed { file } => commands::seed::handle(&file, &actor, output_format).await,
        Commands::Tenant { cmd } => commands::tenant::handle(cmd, &actor, output_format).await,
        Commands::Alerts { cmd } => commands::alerts::handle(cmd, &actor, output_format).await,
    }
}

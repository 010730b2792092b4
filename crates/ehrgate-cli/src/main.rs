mod cli;
mod output;
mod scenario;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use ehrgate_db_memory::InMemoryLedger;
use ehrgate_server::observability::init_tracing_with_level;
use ehrgate_server::{FUNCTIONS, Gateway, GatewayConfig};

use cli::{Cli, Commands};
use output::{print_error, print_success};
use scenario::Scenario;

fn main() {
    if let Err(e) = run() {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let format = cli.format.unwrap_or_default();
    let config = GatewayConfig::load(cli.config.as_deref())?;

    match &cli.command {
        Commands::Replay(args) => {
            init_tracing_with_level(&config.logging.level);
            let scenario = Scenario::load(&args.scenario)?;
            let gateway = Gateway::new(config)?;
            let ledger = InMemoryLedger::new();

            let outcomes = scenario.replay(&gateway, &ledger, args.keep_going)?;
            output::print_outcomes(&outcomes, format)?;

            let stats = ledger.stats();
            println!(
                "{}: {} committed, {} rolled back ({} on conflict), {} keys",
                "Ledger".cyan(),
                stats.committed_transactions,
                stats.rolled_back_transactions,
                stats.conflicted_transactions,
                ledger.len()
            );

            let missed = outcomes.iter().filter(|o| !o.matched()).count();
            let name = scenario.name.as_deref().unwrap_or("scenario");
            if missed > 0 {
                anyhow::bail!("{name}: {missed} step(s) missed their expectation");
            }
            print_success(&format!("{name}: {} step(s) as expected", outcomes.len()));
        }
        Commands::Functions => {
            for function in FUNCTIONS {
                println!("{function}");
            }
        }
        Commands::Config(args) => match &args.command {
            cli::ConfigCommands::Show => {
                if let Some(path) = &cli.config {
                    println!("{}: {}", "Config".cyan(), path.display());
                }
                print!("{}", config.to_toml_string()?);
            }
        },
    }

    Ok(())
}

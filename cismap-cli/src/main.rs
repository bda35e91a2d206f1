mod commands;
mod filter;
mod predict;

use anyhow::Result;
use clap::Command;
use tracing_subscriber::EnvFilter;

use commands::{COMMANDS, CisCommand};

pub mod consts {
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
    pub const PKG_NAME: &str = "cismap";
    pub const BIN_NAME: &str = "cismap";
}

fn build_parser() -> Command {
    COMMANDS.iter().fold(
        Command::new(consts::BIN_NAME)
            .bin_name(consts::BIN_NAME)
            .version(consts::VERSION)
            .about("Predict links between regulatory elements and genes by correlating histone signal with expression across tissues.")
            .subcommand_required(true),
        |app, (_, command)| app.subcommand(command.cli()),
    )
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cismap=info,info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let app = build_parser();
    let matches = app.get_matches();

    match matches.subcommand() {
        Some((name, matches)) => match CisCommand::from_name(name) {
            Some(command) => command.run(matches),
            None => unreachable!("Subcommand not found"),
        },
        None => unreachable!("Subcommand not found"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::*;

    #[rstest]
    fn test_parser_is_consistent() {
        build_parser().debug_assert();
    }
}

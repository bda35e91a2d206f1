use anyhow::Result;
use clap::{ArgMatches, Command};

use crate::{filter, predict};

///
/// Every `cismap` subcommand.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CisCommand {
    Predict,
    Filter,
}

/// Command names and the handlers they resolve to.
pub const COMMANDS: [(&str, CisCommand); 2] = [
    (predict::cli::PREDICT_CMD, CisCommand::Predict),
    (filter::cli::FILTER_CMD, CisCommand::Filter),
];

impl CisCommand {
    pub fn from_name(name: &str) -> Option<CisCommand> {
        COMMANDS
            .iter()
            .find(|(cmd, _)| *cmd == name)
            .map(|(_, command)| *command)
    }

    pub fn cli(&self) -> Command {
        match self {
            CisCommand::Predict => predict::cli::create_predict_cli(),
            CisCommand::Filter => filter::cli::create_filter_cli(),
        }
    }

    pub fn run(&self, matches: &ArgMatches) -> Result<()> {
        match self {
            CisCommand::Predict => predict::handlers::run_predict(matches),
            CisCommand::Filter => filter::handlers::run_filter(matches),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::*;

    #[rstest]
    #[case("predict", Some(CisCommand::Predict))]
    #[case("filter", Some(CisCommand::Filter))]
    #[case("plot", None)]
    fn test_from_name(#[case] name: &str, #[case] expected: Option<CisCommand>) {
        assert_eq!(CisCommand::from_name(name), expected);
    }

    #[rstest]
    fn test_cli_names_match_registry() {
        for (name, command) in COMMANDS {
            assert_eq!(command.cli().get_name(), name);
        }
    }
}

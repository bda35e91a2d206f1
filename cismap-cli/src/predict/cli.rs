use clap::{Command, arg};

pub const PREDICT_CMD: &str = "predict";
pub const DEFAULT_OUTPUT_DIR: &str = ".";

pub fn create_predict_cli() -> Command {
    Command::new(PREDICT_CMD)
        .about("Predict regulatory element to gene links and write the result tables.")
        .arg(
            arg!(--loci <bed>)
                .short('l')
                .required(true)
                .help("BED file of regulatory element loci (.gz accepted)"),
        )
        .arg(
            arg!(--annotation <bed>)
                .short('a')
                .required(true)
                .help("BED6+ TSS annotation; a 7th gene_id column enables TSS views"),
        )
        .arg(
            arg!(--config <config>)
                .short('c')
                .required(true)
                .help("TOML pipeline configuration with histone matrices and expression"),
        )
        .arg(
            arg!(--"output-dir" <dir>)
                .short('o')
                .help("Directory for the result tables (default: current directory)"),
        )
        .arg(
            arg!(--threads <threads>)
                .short('t')
                .value_parser(clap::value_parser!(usize))
                .help("Worker threads for link building (default: all cores)"),
        )
        .arg(
            arg!(--quiet)
                .short('q')
                .action(clap::ArgAction::SetTrue)
                .help("Hide the progress bar"),
        )
}

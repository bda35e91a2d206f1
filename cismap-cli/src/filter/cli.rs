use clap::{Command, arg};

use cismap_links::filter::LinkOrder;

pub const FILTER_CMD: &str = "filter";
pub const DEFAULT_ORDER: LinkOrder = LinkOrder::GeneScore;

pub fn create_filter_cli() -> Command {
    Command::new(FILTER_CMD)
        .about("Filter, sort and truncate a comprehensive links table written by `predict`.")
        .arg(
            arg!(--links <tsv>)
                .short('i')
                .required(true)
                .help("links.tsv from a previous prediction"),
        )
        .arg(
            arg!(--"filter-spec" <json>)
                .help("JSON file with saved filter entries; flags below override it"),
        )
        .arg(
            arg!(--"best-tss")
                .action(clap::ArgAction::SetTrue)
                .help("Keep only links on the best TSS of their gene"),
        )
        .arg(
            arg!(--"best-re")
                .action(clap::ArgAction::SetTrue)
                .help("Keep only the best regulatory element of each TSS and histone"),
        )
        .arg(arg!(--"gene-id" <pattern>).help("Case-insensitive pattern on gene id"))
        .arg(arg!(--"gene-name" <pattern>).help("Case-insensitive pattern on gene name"))
        .arg(arg!(--"tss-id" <pattern>).help("Case-insensitive pattern on TSS id"))
        .arg(arg!(--"re-locus" <pattern>).help("Case-insensitive pattern on element locus"))
        .arg(
            arg!(--"abs-distance-ge" <bp>)
                .allow_hyphen_values(true)
                .help("Minimum absolute distance"),
        )
        .arg(
            arg!(--"abs-distance-le" <bp>)
                .allow_hyphen_values(true)
                .help("Maximum absolute distance"),
        )
        .arg(
            arg!(--"distance-ge" <bp>)
                .allow_hyphen_values(true)
                .help("Minimum signed distance"),
        )
        .arg(
            arg!(--"distance-le" <bp>)
                .allow_hyphen_values(true)
                .help("Maximum signed distance"),
        )
        .arg(
            arg!(--sign <sign>)
                .allow_hyphen_values(true)
                .help("Correlation sign: + or -"),
        )
        .arg(arg!(--"max-score" <p>).help("Exclude links with a link score above this"))
        .arg(arg!(--"max-gene-score" <p>).help("Exclude links with a gene score above this"))
        .arg(
            arg!(--sort <order>)
                .short('s')
                .help("Sort order, e.g. gene_score, score, distance, tss_id (default: gene_score)"),
        )
        .arg(
            arg!(--top <n>)
                .short('n')
                .value_parser(clap::value_parser!(usize))
                .help("Keep only the first n rows after sorting"),
        )
        .arg(
            arg!(--output <output>)
                .short('o')
                .help("Output file (default: stdout)"),
        )
}

use clap::Parser;
use selection_report::cli::{self, Commands};
use selection_report::commands::{self, report::ReportOptions};
use selection_report::config::Config;
use selection_report::report::ReportSettings;
use std::io;

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let args = cli::Args::parse();

    let result = match args.command {
        Commands::Report {
            files,
            annotation,
            summary,
            p_value,
            reference,
            default_tag,
            genome_dir,
            gene_table,
            site_selection,
            config,
            keep_going,
        } => {
            let config = match config {
                Some(path) => Config::from_path(&path),
                None => Config::load(),
            };
            commands::report::run(ReportOptions {
                files,
                annotation,
                summary,
                genome_dir,
                gene_table: gene_table.or(config.gene_table),
                reference_pattern: reference.unwrap_or(config.reference_pattern),
                min_identity: config.min_identity,
                segment_genes: config.segment_genes,
                keep_going,
                settings: ReportSettings {
                    p_value: p_value.unwrap_or(config.p_value),
                    ebf_threshold: config.ebf_threshold,
                    default_tag: default_tag.unwrap_or(config.default_tag),
                    site_selection: site_selection.unwrap_or(config.site_selection),
                },
            })
        }
        Commands::CheckTopology { query, reference } => commands::check_topology::run(&query, &reference),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

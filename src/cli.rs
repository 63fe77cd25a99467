use crate::config::SiteSelection;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Merge selection analysis results into site annotation and segment summary JSON
    Report {
        /// Codon alignment files to process, one per gene or segment
        #[arg(short = 'f', long = "file", required = true, num_args = 1..)]
        files: Vec<PathBuf>,

        /// Annotation JSON to update
        #[arg(short = 'A', long = "annotation")]
        annotation: PathBuf,

        /// Summary JSON to update
        #[arg(short = 'S', long = "summary")]
        summary: PathBuf,

        /// Significance threshold (default: 0.05)
        #[arg(short = 'p', long = "pvalue")]
        p_value: Option<f64>,

        /// Regex selecting the sequence to map onto the genome (default: MN908947)
        #[arg(short = 'r', long = "reference")]
        reference: Option<String>,

        /// Tag for sequences no label matches (default: Reference)
        #[arg(short = 'd', long = "default-tag", alias = "default_tag")]
        default_tag: Option<String>,

        /// Directory of reference segment FASTA files
        #[arg(long)]
        genome_dir: Option<PathBuf>,

        /// JSON gene coordinate table (default: built-in H3N2)
        #[arg(long)]
        gene_table: Option<PathBuf>,

        /// Sites that get annotation records
        #[arg(long, value_enum)]
        site_selection: Option<SiteSelection>,

        /// Config file to use instead of the platform default
        #[arg(long)]
        config: Option<PathBuf>,

        /// Log failing files and continue with the rest
        #[arg(long)]
        keep_going: bool,
    },

    /// Check that two result files share one tree topology
    CheckTopology {
        /// Result JSON whose internal node names are reported
        query: PathBuf,
        /// Result JSON to compare against
        reference: PathBuf,
    },
}

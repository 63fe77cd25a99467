use crate::coordinates::{
    align_to_genome, build_site_map, find_query_sequence, BioSegmentAligner, GeneTable, ReferenceGenome, SiteMap,
};
use crate::error::{ReportError, ReportResult};
use crate::report::{self, ReportSettings, ReportStore, RunContext};
use crate::tree::TagTable;
use crate::utils::progress_bar_builder::ProgressBarBuilder;
use anyhow::{Context, Result};
use regex::Regex;
use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

/// Everything the `report` command needs, after config and flags are merged.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub files: Vec<PathBuf>,
    pub annotation: PathBuf,
    pub summary: PathBuf,
    pub genome_dir: Option<PathBuf>,
    pub gene_table: Option<PathBuf>,
    pub reference_pattern: String,
    pub min_identity: f64,
    pub segment_genes: bool,
    pub keep_going: bool,
    pub settings: ReportSettings,
}

/// Shared, read-only inputs of every file in the batch.
struct Batch<'a> {
    results_dir: PathBuf,
    genome: ReferenceGenome,
    genes: GeneTable,
    aligner: BioSegmentAligner,
    pattern: Regex,
    options: &'a ReportOptions,
}

pub fn run(options: ReportOptions) -> Result<()> {
    let first = options.files.first().context("No input files given")?;
    let results_dir = results_dir(first)?;
    tracing::info!("Results directory: {}", results_dir.display());

    let genome_dir = match &options.genome_dir {
        Some(dir) => dir.clone(),
        None => default_genome_dir(&results_dir),
    };
    tracing::info!("Reference genome directory: {}", genome_dir.display());
    let genome = ReferenceGenome::load_dir(&genome_dir)?;
    if genome.is_empty() {
        tracing::warn!("No reference segments found; sites cannot be mapped to the genome");
    }

    let genes = match &options.gene_table {
        Some(path) => GeneTable::from_path(path)
            .with_context(|| format!("Failed to load gene table {}", path.display()))?,
        None => GeneTable::h3n2(),
    };
    let pattern = Regex::new(&options.reference_pattern)
        .with_context(|| format!("Invalid reference pattern '{}'", options.reference_pattern))?;

    let batch = Batch {
        results_dir,
        genome,
        genes,
        aligner: BioSegmentAligner::default().with_min_identity(options.min_identity),
        pattern,
        options: &options,
    };
    let mut store = ReportStore::load(&options.annotation, &options.summary);
    if store.kept_len() > 0 {
        tracing::warn!("{} earlier records could not be read; they are written back unchanged", store.kept_len());
    }

    let progress = ProgressBarBuilder::new("Merging selection results")
        .with_template("{spinner:.green} [{elapsed_precise}] [{wide_bar}] {pos}/{len} {msg}")
        .with_length(options.files.len() as u64)
        .with_tick()
        .hidden(!std::io::stderr().is_terminal())
        .build()?;

    let mut failures = Vec::new();
    for file in &options.files {
        progress.set_message(file.display().to_string());
        let checkpoint = options.keep_going.then(|| store.clone());
        match process_input(&batch, file, &mut store) {
            Ok(()) => {}
            Err(e) if options.keep_going => {
                tracing::error!("Skipping {}: {}", file.display(), e);
                failures.push(file.display().to_string());
                if let Some(checkpoint) = checkpoint {
                    store = checkpoint;
                }
            }
            Err(e) => {
                progress.abandon_with_message("Aborted");
                return Err(e).with_context(|| format!("Failed to process {}", file.display()));
            }
        }
        progress.inc(1);
    }
    progress.finish_with_message("Done");

    store
        .write(&options.annotation, &options.summary)
        .context("Failed to write reports")?;

    println!("\nReport Summary:");
    println!("Input files: {}", options.files.len());
    println!("Annotated sites: {}", store.annotation.len());
    println!("Summarised genes: {}", store.summary.len());

    if !failures.is_empty() {
        anyhow::bail!(
            "{} of {} input files failed: {}",
            failures.len(),
            options.files.len(),
            failures.join(", ")
        );
    }
    Ok(())
}

/// Merge all results belonging to one alignment file.
fn process_input(batch: &Batch, file: &Path, store: &mut ReportStore) -> ReportResult<()> {
    if !file.is_file() {
        return Err(ReportError::MissingInput(file.to_path_buf()));
    }
    let key = gene_key(file);
    tracing::info!("Processing {} ({})", file.display(), key);

    let tag_table = TagTable::load(&batch.results_dir.join(format!("{}.labels.json", key)));
    let (site_map, genes) = map_query(batch, file, &key)?;

    let mut ctx = RunContext::new(key, &batch.options.settings, tag_table, site_map, genes, store);
    report::run_all(&mut ctx, &batch.results_dir)
}

/// Site map of the query record and the gene table that applies to it.
fn map_query(batch: &Batch, file: &Path, key: &str) -> ReportResult<(SiteMap, GeneTable)> {
    let Some(query) = find_query_sequence(file, &batch.pattern)? else {
        tracing::warn!("No record in {} matches '{}'", file.display(), batch.pattern);
        return Ok((SiteMap::default(), batch.genes.clone()));
    };
    let Some(alignment) = align_to_genome(&batch.aligner, &batch.genome, &query)? else {
        tracing::warn!("{} did not align to any reference segment; no sites will be annotated", key);
        return Ok((SiteMap::default(), batch.genes.clone()));
    };
    let site_map = build_site_map(&alignment.gapped_reference, &query, alignment.offset)?;
    let genes = if batch.options.segment_genes {
        batch.genes.for_segment(&alignment.segment)
    } else {
        batch.genes.clone()
    };
    Ok((site_map, genes))
}

/// File name up to its first `.`: `HA.nex.fas` -> `HA`.
pub fn gene_key(file: &Path) -> String {
    file.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.split('.').next())
        .unwrap_or_default()
        .to_string()
}

fn results_dir(first: &Path) -> Result<PathBuf> {
    let canonical = fs::canonicalize(first).with_context(|| format!("Cannot resolve {}", first.display()))?;
    Ok(canonical.parent().map(Path::to_path_buf).unwrap_or_default())
}

/// `<results>/../../data/reference/<type>/genome`, `<type>` being the name of
/// the results directory.
pub fn default_genome_dir(results_dir: &Path) -> PathBuf {
    let genome_type = results_dir.file_name().unwrap_or_default();
    let base = results_dir.parent().and_then(Path::parent).unwrap_or(results_dir);
    base.join("data").join("reference").join(genome_type).join("genome")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gene_key_is_first_dot_segment() {
        assert_eq!(gene_key(Path::new("/data/results/H3N2/HA.nex.fas")), "HA");
        assert_eq!(gene_key(Path::new("NA")), "NA");
    }

    #[test]
    fn test_default_genome_dir() {
        assert_eq!(
            default_genome_dir(Path::new("/project/results/H3N2")),
            PathBuf::from("/project/data/reference/H3N2/genome")
        );
    }
}

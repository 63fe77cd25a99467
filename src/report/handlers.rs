use super::context::{RunContext, SiteReportEntry};
use super::hyphy::{HeaderColumns, HyphyResult, MleRow};
use super::model::{
    BustedTest, CfelSite, FadeSite, FelSite, MemeSite, PrimeSite, Rates, RelaxTest, SubstitutionCounts,
};
use crate::error::{ReportError, ReportResult};
use crate::tree::{parse_tree, NodeTags, TreeNode};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

const BRANCH_LENGTH_KEY: &str = "Global MG94xREV";
const POSTERIOR_KEY: &str = "Posterior prob omega class by site";

/// Selection-analysis result kinds, in the order they must be merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Cfel,
    Relax,
    Slac,
    Busteds,
    Bgm,
    Fel,
    Fade,
    Prime,
    Meme,
    MemeFull,
}

impl ResultKind {
    /// RELAX reads the categories contrast-FEL found; MEME annotates the
    /// branches SLAC tagged.
    pub const PROCESSING_ORDER: [ResultKind; 10] = [
        ResultKind::Cfel,
        ResultKind::Relax,
        ResultKind::Slac,
        ResultKind::Busteds,
        ResultKind::Bgm,
        ResultKind::Fel,
        ResultKind::Fade,
        ResultKind::Prime,
        ResultKind::Meme,
        ResultKind::MemeFull,
    ];

    pub fn suffix(self) -> &'static str {
        match self {
            ResultKind::Cfel => "CFEL.json",
            ResultKind::Relax => "RELAX.json",
            ResultKind::Slac => "SLAC.json",
            ResultKind::Busteds => "BUSTEDS.json",
            ResultKind::Bgm => "combined.fas.BGM.json",
            ResultKind::Fel => "FEL.json",
            ResultKind::Fade => "FADE.json",
            ResultKind::Prime => "PRIME.json",
            ResultKind::Meme => "MEME.json",
            ResultKind::MemeFull => "MEME-full.json",
        }
    }

    pub fn path(self, results_dir: &Path, gene_key: &str) -> PathBuf {
        results_dir.join(format!("{}.{}", gene_key, self.suffix()))
    }
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResultKind::Cfel => "CFEL",
            ResultKind::Relax => "RELAX",
            ResultKind::Slac => "SLAC",
            ResultKind::Busteds => "BUSTED[S]",
            ResultKind::Bgm => "BGM",
            ResultKind::Fel => "FEL",
            ResultKind::Fade => "FADE",
            ResultKind::Prime => "PRIME",
            ResultKind::Meme => "MEME",
            ResultKind::MemeFull => "MEME (full)",
        };
        f.write_str(name)
    }
}

/// Merge every result file of the context's gene found in `results_dir`.
pub fn run_all(ctx: &mut RunContext, results_dir: &Path) -> ReportResult<()> {
    for kind in ResultKind::PROCESSING_ORDER {
        let path = kind.path(results_dir, ctx.gene_key());
        let found = process_file(ctx, kind, &path)?;
        if kind == ResultKind::Cfel && !found {
            // No contrast-FEL results means no significant sites.
            ctx.apply_site_selection();
        }
    }
    tracing::info!(
        "{}: {} significant sites, {} annotated",
        ctx.gene_key(),
        ctx.site_reports.len(),
        ctx.included().len()
    );
    Ok(())
}

/// Merge one result file; returns `false` when it is missing or empty.
pub fn process_file(ctx: &mut RunContext, kind: ResultKind, path: &Path) -> ReportResult<bool> {
    let Some(result) = HyphyResult::load(path)? else {
        tracing::info!("{} results {} are empty or missing, skipping", kind, path.display());
        return Ok(false);
    };
    tracing::info!("Processing {} results from {}", kind, path.display());
    match kind {
        ResultKind::Cfel => process_cfel(ctx, &result)?,
        ResultKind::Relax => process_relax(ctx, &result),
        ResultKind::Slac => process_slac(ctx, &result)?,
        ResultKind::Busteds => process_busteds(ctx, &result)?,
        ResultKind::Bgm => process_bgm(ctx, &result),
        ResultKind::Fel => process_fel(ctx, &result)?,
        ResultKind::Fade => process_fade(ctx, &result)?,
        ResultKind::Prime => process_prime(ctx, &result)?,
        ResultKind::Meme => process_meme(ctx, &result, MemeVariant::Internal)?,
        ResultKind::MemeFull => process_meme(ctx, &result, MemeVariant::Full)?,
    }
    Ok(true)
}

fn branch_length(attributes: &Map<String, Value>, branch: &str) -> Option<f64> {
    attributes.get(branch)?.get(BRANCH_LENGTH_KEY)?.as_f64()
}

/// Ancestral or observed state (`codon` or `amino-acid`) of a branch at one site.
fn branch_state(attributes: &Map<String, Value>, branch: &str, key: &str, site: usize) -> Option<String> {
    let state = attributes.get(branch)?.get(key)?.get(0)?.get(site)?;
    state.as_str().map(str::to_string)
}

pub fn process_cfel(ctx: &mut RunContext, result: &HyphyResult) -> ReportResult<()> {
    let attributes = result.branch_attributes()?;
    let tagger = ctx.tagger(attributes);
    let parsed = parse_tree(result.tree()?, false, Some(&tagger))?;
    tracing::debug!("Contrast-FEL tree has {} tagged nodes", parsed.node_tags.len());

    let mut rates = Rates::default();
    let distributions_key = ["fits", "Global MG94xREV", "Rate Distributions"];
    for (name, distribution) in result.object(&distributions_key)? {
        let category = name.split('*').nth(1).ok_or_else(|| result.missing(&distributions_key))?;
        let omega = distribution
            .get(0)
            .and_then(|d| d.get(0))
            .and_then(Value::as_f64)
            .ok_or_else(|| result.missing(&distributions_key))?;
        let group = if category == "background" { "Reference" } else { "Test" };
        ctx.test_map.insert(category.to_string(), group.to_string());
        rates.mean_omega.insert(category.to_string(), omega);
        rates.total_length.insert(category.to_string(), 0.0);
    }
    for (branch, category) in result.object(&["tested", "0"])? {
        let category = category.as_str().unwrap_or_default();
        if category.is_empty() {
            continue;
        }
        let length = branch_length(attributes, branch)
            .ok_or_else(|| result.missing(&["branch attributes", "0", branch.as_str(), BRANCH_LENGTH_KEY]))?;
        *rates.total_length.entry(category.to_string()).or_insert(0.0) += length;
    }
    ctx.summary().rates = Some(rates);

    let columns = HeaderColumns::discover(&result.mle_headers()?)?;
    let rows = result.mle_rows()?;
    let p_value = ctx.settings().p_value;
    for row in &rows {
        if row.from_end(4)? <= p_value {
            ctx.site_reports.insert(
                row.site,
                SiteReportEntry {
                    cfel: Some(row.values().to_vec()),
                    ..Default::default()
                },
            );
        }
    }
    ctx.cfel_rows = rows.iter().map(|row| row.values().to_vec()).collect();
    ctx.apply_site_selection();

    for row in &rows {
        if !ctx.is_included(row.site) {
            continue;
        }
        let site = CfelSite {
            alpha: row.at(0)?,
            beta: row.labelled(&columns.beta)?,
            p_values: row.labelled(&columns.p_value)?,
            permutation_p: row.from_end(2)?,
            substitutions: row.labelled(&columns.substitutions)?,
            q_value: row.from_end(3)?,
        };
        if let Some(record) = ctx.annotation(row.site) {
            record.cfel = Some(site);
        }
    }
    Ok(())
}

/// Never fails the file: RELAX fits that do not line up with the
/// contrast-FEL categories are reported and skipped.
pub fn process_relax(ctx: &mut RunContext, result: &HyphyResult) {
    match relax_rates(ctx, result) {
        Ok(Some((rates, test))) => {
            let summary = ctx.summary();
            if let Some(summary_rates) = summary.rates.as_mut() {
                summary_rates.relax = Some(rates);
            }
            summary.relax = Some(test);
        }
        Ok(None) => tracing::info!("No contrast-FEL rates for {}, skipping RELAX", ctx.gene_key()),
        Err(e) => tracing::warn!("Could not read RELAX results {}: {}", result.file(), e),
    }
}

type RelaxRates = (BTreeMap<String, Vec<Value>>, RelaxTest);

fn relax_rates(ctx: &RunContext, result: &HyphyResult) -> ReportResult<Option<RelaxRates>> {
    let Some(rates) = ctx.summary_ref().and_then(|s| s.rates.as_ref()) else {
        return Ok(None);
    };
    let mut relax = BTreeMap::new();
    for category in rates.mean_omega.keys() {
        let group = ctx.test_map.get(category).ok_or_else(|| {
            ReportError::InternalConsistency(format!("category '{}' was not seen in this run's contrast-FEL fits", category))
        })?;
        let distribution = result.object(&["fits", "RELAX alternative", "Rate Distributions", group.as_str()])?;
        relax.insert(category.clone(), distribution.values().cloned().collect());
    }
    let test = RelaxTest {
        p: result.number(&["test results", "p-value"])?,
        k: result.number(&["test results", "relaxation or intensification parameter"])?,
    };
    Ok(Some((relax, test)))
}

pub fn process_slac(ctx: &mut RunContext, result: &HyphyResult) -> ReportResult<()> {
    let attributes = result.branch_attributes()?;
    let tree_text = result.tree()?;
    let tagger = ctx.tagger(attributes);
    let parsed = parse_tree(tree_text, false, Some(&tagger))?;
    let mut node_tags = parsed.node_tags;

    // Branches the tree text does not name are the root.
    let mut root_branch = None;
    for branch in attributes.keys() {
        match node_tags.get_mut(branch) {
            Some(tag) => tag.branch_length = branch_length(attributes, branch),
            None => root_branch = Some(branch.as_str()),
        }
    }

    let summary = ctx.summary();
    summary.tree = Some(tree_text.to_string());
    summary.tree_tags = Some(node_tags.clone());

    let sites = ctx.included();
    if sites.is_empty() {
        return Ok(());
    }
    let mut subs = BTreeMap::new();
    for (site, coordinate) in sites {
        let mut labels = BTreeMap::new();
        label_substitutions(&parsed.root, attributes, site, None, root_branch, &mut labels);
        subs.insert(coordinate, labels);

        let (codons, residues) = tally_leaf_states(result, attributes, &node_tags, site)?;
        if let Some(record) = ctx.annotation(site) {
            record.codons = Some(codons);
            record.amino_acids = Some(residues);
        }
    }
    ctx.summary().subs = Some(subs);
    Ok(())
}

/// Codon and amino-acid counts per lineage tag over tagged leaves.
fn tally_leaf_states(
    result: &HyphyResult,
    attributes: &Map<String, Value>,
    node_tags: &NodeTags,
    site: usize,
) -> ReportResult<(SubstitutionCounts, SubstitutionCounts)> {
    let categories: BTreeSet<&str> = node_tags
        .values()
        .map(|t| t.tag.as_str())
        .filter(|t| !t.is_empty())
        .collect();
    let mut codons: SubstitutionCounts = categories.iter().map(|c| (c.to_string(), BTreeMap::new())).collect();
    let mut residues = codons.clone();

    for (branch, tag) in node_tags {
        if tag.tag.is_empty() || !tag.is_leaf {
            continue;
        }
        let codon = branch_state(attributes, branch, "codon", site)
            .ok_or_else(|| result.missing(&["branch attributes", "0", branch.as_str(), "codon"]))?;
        let residue = branch_state(attributes, branch, "amino-acid", site)
            .ok_or_else(|| result.missing(&["branch attributes", "0", branch.as_str(), "amino-acid"]))?;
        *codons.entry(tag.tag.clone()).or_default().entry(codon).or_insert(0) += 1;
        *residues.entry(tag.tag.clone()).or_default().entry(residue).or_insert(0) += 1;
    }
    Ok((codons, residues))
}

/// Record the codon of every node whose state differs from its parent's.
///
/// The synthetic root takes the state of `root_branch`, and is recorded under
/// both names.
fn label_substitutions(
    node: &TreeNode,
    attributes: &Map<String, Value>,
    site: usize,
    parent_state: Option<&str>,
    root_branch: Option<&str>,
    labels: &mut BTreeMap<String, String>,
) {
    let branch = if node.is_root() { root_branch } else { Some(node.name.as_str()) };
    let state = branch.and_then(|b| branch_state(attributes, b, "codon", site));
    match (branch, state.as_deref()) {
        (Some(branch), Some(codon)) => {
            if parent_state != Some(codon) {
                labels.insert(branch.to_string(), codon.to_string());
                labels.insert(node.name.clone(), codon.to_string());
            }
        }
        _ => tracing::debug!("Node '{}' has no SLAC codon at site {}", node.name, site),
    }
    for child in &node.children {
        label_substitutions(child, attributes, site, state.as_deref(), root_branch, labels);
    }
}

pub fn process_busteds(ctx: &mut RunContext, result: &HyphyResult) -> ReportResult<()> {
    let distributions = result
        .get(&["fits", "Unconstrained model", "Rate Distributions"])?
        .clone();
    let p = result.number(&["test results", "p-value"])?;

    let summary = ctx.summary();
    let Some(rates) = summary.rates.as_mut() else {
        tracing::info!("No rates recorded yet, skipping BUSTED[S]");
        return Ok(());
    };
    rates.busted = Some(distributions);
    summary.busted = Some(BustedTest { p });
    Ok(())
}

pub fn process_bgm(ctx: &mut RunContext, result: &HyphyResult) {
    let content = result
        .get(&["MLE", "content"])
        .cloned()
        .unwrap_or_else(|_| Value::Array(Vec::new()));
    ctx.summary().bgm = Some(content);
}

pub fn process_fel(ctx: &mut RunContext, result: &HyphyResult) -> ReportResult<()> {
    let p_value = ctx.settings().p_value;
    for row in result.mle_rows()? {
        let (alpha, beta, p) = (row.at(0)?, row.at(1)?, row.at(4)?);
        if let Some(record) = ctx.annotation(row.site) {
            record.fel = Some(FelSite {
                alpha,
                beta,
                p_value: p,
            });
        }

        if let Some(entry) = ctx.site_reports.get_mut(&row.site) {
            entry.fel = Some(row.values().to_vec());
        } else if p <= p_value && beta > alpha {
            let cfel = ctx.cfel_rows.get(row.site).cloned();
            ctx.site_reports.insert(
                row.site,
                SiteReportEntry {
                    cfel,
                    fel: Some(row.values().to_vec()),
                    ..Default::default()
                },
            );
        }
    }
    Ok(())
}

pub fn process_fade(ctx: &mut RunContext, result: &HyphyResult) -> ReportResult<()> {
    let sites = ctx.included();
    if sites.is_empty() {
        return Ok(());
    }
    let mut residues: Vec<(&str, Vec<MleRow>)> = Vec::new();
    for residue in result.object(&["MLE", "content"])?.keys() {
        // Only single-residue targets; the table also carries aggregate entries.
        if residue.chars().count() == 1 {
            residues.push((residue.as_str(), result.rows_at(&["MLE", "content", residue.as_str(), "0"])?));
        }
    }

    for (site, _) in sites {
        let mut fade = BTreeMap::new();
        for (residue, rows) in &residues {
            let row = rows.get(site).ok_or_else(|| missing_site(result, site))?;
            fade.insert(
                residue.to_string(),
                FadeSite {
                    rate: row.at(1)?,
                    bayes_factor: row.from_end(1)?,
                },
            );
        }
        if let Some(record) = ctx.annotation(site) {
            record.fade = Some(fade);
        }
    }
    Ok(())
}

fn missing_site(result: &HyphyResult, site: usize) -> ReportError {
    ReportError::malformed(result.file(), format!("no row for site {}", site))
}

pub fn process_prime(ctx: &mut RunContext, result: &HyphyResult) -> ReportResult<()> {
    let headers = result.mle_headers()?;
    let properties = headers
        .iter()
        .skip(6)
        .step_by(3)
        .map(|(_, description)| description.replace("Importance for ", ""))
        .collect();
    ctx.summary().prime_properties = Some(properties);

    let sites = ctx.included();
    if sites.is_empty() {
        return Ok(());
    }
    let rows = result.mle_rows()?;
    for (site, _) in sites {
        let row = rows.get(site).ok_or_else(|| missing_site(result, site))?;
        let prime = if row.is_empty() {
            None
        } else {
            let mut p = vec![row.at(5)?];
            for column in (7..row.len()).step_by(3) {
                p.push(row.at(column)?);
            }
            let mut lambda = Vec::new();
            for column in (6..row.len()).step_by(3) {
                lambda.push(row.at(column)?);
            }
            Some(PrimeSite { p, lambda })
        };
        if let Some(record) = ctx.annotation(site) {
            record.prime = Some(prime);
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemeVariant {
    /// Internal branches only.
    Internal,
    /// All branches.
    Full,
}

/// Posterior odds over prior odds; `None` when either probability is 0 or 1.
pub fn empirical_bayes_factor(posterior: f64, prior: f64) -> Option<f64> {
    if posterior == 0.0 || posterior == 1.0 || prior == 0.0 || prior == 1.0 {
        return None;
    }
    Some((posterior / (1.0 - posterior)) / (prior / (1.0 - prior)))
}

pub fn process_meme(ctx: &mut RunContext, result: &HyphyResult, variant: MemeVariant) -> ReportResult<()> {
    let rows = result.mle_rows()?;
    let p_value = ctx.settings().p_value;
    for row in &rows {
        let p = row.at(6)?;
        if ctx.is_included(row.site) {
            let site = MemeSite {
                p_value: p,
                alpha: row.at(0)?,
                beta_plus: row.at(3)?,
                weight_plus: row.at(4)?,
                beta_minus: row.at(1)?,
                weight_minus: row.at(2)?,
                branches: row.at(7)?,
            };
            if let Some(record) = ctx.annotation(row.site) {
                match variant {
                    MemeVariant::Internal => record.meme = Some(site),
                    MemeVariant::Full => record.meme_full = Some(site),
                }
            }
        }

        let flagged = ctx.site_reports.contains_key(&row.site) || p <= p_value;
        if flagged {
            let entry = ctx.site_reports.entry(row.site).or_default();
            let values = Some(row.values().to_vec());
            match variant {
                MemeVariant::Internal => entry.meme = values,
                MemeVariant::Full => entry.meme_full = values,
            }
        }
    }

    let node_sites = node_significant_sites(ctx, result, &rows)?;
    let Some(tree_tags) = ctx.summary().tree_tags.as_mut() else {
        tracing::info!("No SLAC tree tags yet, skipping branch annotations from {}", result.file());
        return Ok(());
    };
    for (node, sites) in node_sites {
        if let Some(tag) = tree_tags.get_mut(&node) {
            match variant {
                MemeVariant::Internal => tag.meme = Some(sites),
                MemeVariant::Full => tag.meme_full = Some(sites),
            }
        }
    }
    Ok(())
}

/// Coordinates where each tagged node's empirical Bayes factor reaches the
/// threshold. The prior is the site's `p+` weight.
fn node_significant_sites(
    ctx: &RunContext,
    result: &HyphyResult,
    rows: &[MleRow],
) -> ReportResult<Vec<(String, Vec<u64>)>> {
    let Some(known) = ctx.summary_ref().and_then(|s| s.tree_tags.as_ref()) else {
        return Ok(Vec::new());
    };
    let mut priors = Vec::with_capacity(rows.len());
    for row in rows {
        priors.push(row.at(4)?);
    }
    let threshold = ctx.settings().ebf_threshold;

    let mut node_sites = Vec::new();
    for (node, info) in result.branch_attributes()? {
        if !known.contains_key(node) {
            continue;
        }
        let mut sites = Vec::new();
        let posteriors = info.get(POSTERIOR_KEY).and_then(|p| p.get(1)).and_then(Value::as_array);
        for (site, posterior) in posteriors.into_iter().flatten().enumerate() {
            let (Some(posterior), Some(&prior)) = (posterior.as_f64(), priors.get(site)) else {
                continue;
            };
            let significant = empirical_bayes_factor(posterior, prior).is_some_and(|ebf| ebf >= threshold);
            if let (true, Some(coordinate)) = (significant, ctx.coordinate_of(site)) {
                sites.push(coordinate);
            }
        }
        node_sites.push((node.clone(), sites));
    }
    Ok(node_sites)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ebf_skips_boundary_probabilities() {
        assert_eq!(empirical_bayes_factor(0.0, 0.5), None);
        assert_eq!(empirical_bayes_factor(1.0, 0.5), None);
        assert_eq!(empirical_bayes_factor(0.5, 0.0), None);
        assert_eq!(empirical_bayes_factor(0.5, 1.0), None);
        assert_eq!(empirical_bayes_factor(0.5, 0.5), Some(1.0));
        let ebf = empirical_bayes_factor(0.99, 0.5).unwrap();
        assert!((ebf - 99.0).abs() < 1e-9);
    }

    #[test]
    fn test_result_paths() {
        let dir = Path::new("/results");
        assert_eq!(ResultKind::Bgm.path(dir, "HA"), PathBuf::from("/results/HA.combined.fas.BGM.json"));
        assert_eq!(ResultKind::MemeFull.path(dir, "NA"), PathBuf::from("/results/NA.MEME-full.json"));
        assert_eq!(ResultKind::PROCESSING_ORDER[0], ResultKind::Cfel);
        assert_eq!(ResultKind::PROCESSING_ORDER[1], ResultKind::Relax);
    }
}

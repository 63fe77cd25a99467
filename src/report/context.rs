use super::model::{AnnotationRecord, SummaryRecord};
use super::store::ReportStore;
use crate::config::SiteSelection;
use crate::coordinates::{resolve_gene_site, GeneTable, SiteCoordinate, SiteMap};
use crate::tree::{TagPropagator, TagTable};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Thresholds shared by every file of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSettings {
    pub p_value: f64,
    pub ebf_threshold: f64,
    pub default_tag: String,
    pub site_selection: SiteSelection,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            p_value: 0.05,
            ebf_threshold: 100.0,
            default_tag: "Reference".to_string(),
            site_selection: SiteSelection::All,
        }
    }
}

/// Raw rows of the tests that flagged one query site.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteReportEntry {
    pub cfel: Option<Vec<Value>>,
    pub fel: Option<Vec<Value>>,
    pub meme: Option<Vec<Value>>,
    pub meme_full: Option<Vec<Value>>,
}

/// State of one input file while its result files are merged into the store.
pub struct RunContext<'a> {
    gene_key: String,
    settings: &'a ReportSettings,
    tag_table: TagTable,
    site_map: SiteMap,
    genes: GeneTable,
    /// Query site -> genomic coordinate for every site that gets annotated.
    include: BTreeMap<usize, u64>,
    pub site_reports: BTreeMap<usize, SiteReportEntry>,
    /// Branch category -> lineage group, from the contrast-FEL fits.
    pub test_map: BTreeMap<String, String>,
    /// Contrast-FEL rows, kept for sites FEL flags later.
    pub cfel_rows: Vec<Vec<Value>>,
    touched: BTreeSet<u64>,
    store: &'a mut ReportStore,
}

impl<'a> RunContext<'a> {
    pub fn new(
        gene_key: impl Into<String>,
        settings: &'a ReportSettings,
        tag_table: TagTable,
        site_map: SiteMap,
        genes: GeneTable,
        store: &'a mut ReportStore,
    ) -> Self {
        let gene_key = gene_key.into();
        let include = (0..site_map.len())
            .filter_map(|site| {
                let coordinate = *site_map.as_slice().get(site)?;
                u64::try_from(coordinate).ok().map(|c| (site, c))
            })
            .collect();
        store.summary.entry(gene_key.clone()).or_default().map = Some(site_map.clone());
        Self {
            gene_key,
            settings,
            tag_table,
            site_map,
            genes,
            include,
            site_reports: BTreeMap::new(),
            test_map: BTreeMap::new(),
            cfel_rows: Vec::new(),
            touched: BTreeSet::new(),
            store,
        }
    }

    pub fn gene_key(&self) -> &str {
        &self.gene_key
    }

    pub fn settings(&self) -> &ReportSettings {
        self.settings
    }

    /// Tagger for a tree whose leaves are described by `attributes`.
    pub fn tagger<'t>(&'t self, attributes: &'t Map<String, Value>) -> TagPropagator<'t> {
        TagPropagator::new(&self.tag_table, &self.settings.default_tag).with_branch_attributes(attributes)
    }

    pub fn site_coordinate(&self, site: usize) -> SiteCoordinate {
        resolve_gene_site(self.site_map.position(site), &self.genes)
    }

    pub fn coordinate_of(&self, site: usize) -> Option<u64> {
        self.include.get(&site).copied()
    }

    pub fn is_included(&self, site: usize) -> bool {
        self.include.contains_key(&site)
    }

    /// Included sites in query order, with their coordinates.
    pub fn included(&self) -> Vec<(usize, u64)> {
        self.include.iter().map(|(&site, &coordinate)| (site, coordinate)).collect()
    }

    /// Apply the configured site selection once significance is known.
    pub fn apply_site_selection(&mut self) {
        if self.settings.site_selection == SiteSelection::Significant {
            let reports = &self.site_reports;
            self.include.retain(|site, _| reports.contains_key(site));
            tracing::info!("{} significant sites selected for annotation", self.include.len());
        }
    }

    /// The annotation record of an included site.
    ///
    /// The first access in a run replaces any record loaded from disk, so a
    /// rerun rewrites a coordinate instead of mixing old and new fields.
    pub fn annotation(&mut self, site: usize) -> Option<&mut AnnotationRecord> {
        let coordinate = self.coordinate_of(site)?;
        if self.touched.insert(coordinate) {
            let resolved = self.site_coordinate(site);
            self.store
                .annotation
                .insert(coordinate, AnnotationRecord::new(resolved.gene, resolved.gene_site, site));
        }
        self.store.annotation.get_mut(&coordinate)
    }

    pub fn summary(&mut self) -> &mut SummaryRecord {
        self.store.summary.entry(self.gene_key.clone()).or_default()
    }

    pub fn summary_ref(&self) -> Option<&SummaryRecord> {
        self.store.summary.get(&self.gene_key)
    }
}

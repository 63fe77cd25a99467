use super::site_map::GenomicPosition;
use crate::error::{ReportError, ReportResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const NOT_MAPPED: &str = "Not mapped";
pub const NOT_AVAILABLE: &str = "N/A";
pub const DELETION_SITE: &str = "Not in genome (deletion)";

/// One reading frame on a genome segment, `[start, end)` in genomic coordinates.
///
/// Accepts the compact `[start, end, gene, offset, segment]` row form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneCoordinateEntry {
    pub start: u64,
    pub end: u64,
    pub gene: String,
    /// Added to the coordinate before computing the in-gene codon.
    pub codon_offset: u64,
    pub segment: String,
}

impl GeneCoordinateEntry {
    pub fn new(start: u64, end: u64, gene: &str, codon_offset: u64, segment: &str) -> Self {
        Self {
            start,
            end,
            gene: gene.to_string(),
            codon_offset,
            segment: segment.to_string(),
        }
    }

    pub fn contains(&self, coordinate: u64) -> bool {
        self.start <= coordinate && coordinate < self.end
    }

    /// 1-based codon number of `coordinate` within this gene.
    pub fn codon_of(&self, coordinate: u64) -> i64 {
        ((coordinate + self.codon_offset) as i64 - self.start as i64).div_euclid(3) + 1
    }
}

/// Gene coordinates in lookup order; overlapping frames resolve to the first entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneTable {
    entries: Vec<GeneCoordinateEntry>,
}

impl GeneTable {
    pub fn new(entries: Vec<GeneCoordinateEntry>) -> Self {
        Self { entries }
    }

    /// Influenza A H3N2 reading frames (NCBI coordinates).
    pub fn h3n2() -> Self {
        Self::new(vec![
            GeneCoordinateEntry::new(30, 1730, "HA", 0, "segment4"),
            GeneCoordinateEntry::new(46, 1542, "NP", 0, "segment5"),
            GeneCoordinateEntry::new(119, 391, "PB1_F2", 0, "segment2"),
            GeneCoordinateEntry::new(25, 2298, "PB1", 0, "segment2"),
            GeneCoordinateEntry::new(20, 1429, "NA", 0, "segment6"),
            GeneCoordinateEntry::new(26, 784, "M1", 0, "segment7"),
            GeneCoordinateEntry::new(28, 2307, "PB2", 0, "segment1"),
            GeneCoordinateEntry::new(25, 2175, "PA", 0, "segment3"),
            GeneCoordinateEntry::new(27, 719, "NS1", 0, "segment3"),
        ])
    }

    /// Load a JSON array of `[start, end, gene, offset, segment]` rows.
    pub fn from_path(path: &Path) -> ReportResult<Self> {
        let contents = crate::utils::io::read_to_string(path)?;
        let entries: Vec<GeneCoordinateEntry> = serde_json::from_str(&contents)
            .map_err(|e| ReportError::malformed(path.display().to_string(), e.to_string()))?;
        Ok(Self::new(entries))
    }

    /// Entries on one segment only, keeping table order.
    pub fn for_segment(&self, segment: &str) -> Self {
        Self::new(self.entries.iter().filter(|e| e.segment == segment).cloned().collect())
    }

    pub fn entries(&self) -> &[GeneCoordinateEntry] {
        &self.entries
    }

    pub fn find(&self, coordinate: u64) -> Option<&GeneCoordinateEntry> {
        self.entries.iter().find(|e| e.contains(coordinate))
    }
}

/// In-gene site: a codon number (`-1` when unknown) or a description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GeneSite {
    Codon(i64),
    Description(String),
}

impl Default for GeneSite {
    fn default() -> Self {
        GeneSite::Codon(-1)
    }
}

/// Genomic coordinate, gene and in-gene codon of one query site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteCoordinate {
    pub position: GenomicPosition,
    pub gene: String,
    pub gene_site: GeneSite,
}

impl SiteCoordinate {
    pub fn genomic_coordinate(&self) -> Option<u64> {
        match self.position {
            GenomicPosition::Mapped(c) => Some(c),
            _ => None,
        }
    }
}

pub fn resolve_gene_site(position: GenomicPosition, table: &GeneTable) -> SiteCoordinate {
    let (gene, gene_site) = match position {
        GenomicPosition::NotAvailable => (NOT_AVAILABLE.to_string(), GeneSite::Codon(-1)),
        GenomicPosition::Deletion => (String::new(), GeneSite::Description(DELETION_SITE.to_string())),
        GenomicPosition::Mapped(coordinate) => match table.find(coordinate) {
            Some(entry) => (entry.gene.clone(), GeneSite::Codon(entry.codon_of(coordinate))),
            None => (NOT_MAPPED.to_string(), GeneSite::Codon(-1)),
        },
    };
    SiteCoordinate {
        position,
        gene,
        gene_site,
    }
}

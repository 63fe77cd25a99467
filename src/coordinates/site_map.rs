use crate::error::{ReportError, ReportResult};
use serde::{Deserialize, Serialize};

/// Sentinel for a query codon that is a deletion relative to the genome.
pub const DELETION: i64 = -1;

const GAP_CODON: &[u8] = b"---";

/// Genomic nucleotide coordinate of each query codon, in query order.
///
/// Serialised as a plain integer array with `-1` for deletions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteMap(Vec<i64>);

/// Where a query codon lands on the genome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenomicPosition {
    Mapped(u64),
    Deletion,
    /// No site map was built (the query never aligned) or the site is past its end.
    NotAvailable,
}

impl SiteMap {
    pub fn new(coordinates: Vec<i64>) -> Self {
        Self(coordinates)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }

    pub fn position(&self, site: usize) -> GenomicPosition {
        match self.0.get(site) {
            None => GenomicPosition::NotAvailable,
            Some(&c) if c < 0 => GenomicPosition::Deletion,
            Some(&c) => GenomicPosition::Mapped(c as u64),
        }
    }
}

/// Map every query codon onto the genome.
///
/// `gapped_reference` is the genome segment as aligned against the query,
/// starting at `offset` on the segment; `gapped_query` is the query row of the
/// codon alignment. Both are gapped in whole `---` codons.
pub fn build_site_map(gapped_reference: &str, gapped_query: &str, offset: usize) -> ReportResult<SiteMap> {
    let reference_codons: Vec<usize> = gapped_reference
        .as_bytes()
        .chunks(3)
        .enumerate()
        .filter(|(_, codon)| *codon != GAP_CODON)
        .map(|(i, _)| i * 3)
        .collect();

    let mut coordinates = Vec::with_capacity(gapped_query.len().div_ceil(3));
    let mut non_gap = 0usize;
    for codon in gapped_query.as_bytes().chunks(3) {
        if codon == GAP_CODON {
            coordinates.push(DELETION);
            continue;
        }
        let position = reference_codons.get(non_gap / 3).ok_or_else(|| {
            ReportError::InternalConsistency(format!(
                "query codon {} has no counterpart among {} aligned reference codons",
                non_gap / 3,
                reference_codons.len()
            ))
        })?;
        coordinates.push((position + offset) as i64);
        non_gap += 3;
    }
    Ok(SiteMap(coordinates))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ungapped_map_is_monotonic() {
        let map = build_site_map("ATGCAT", "ATGCAT", 100).unwrap();
        assert_eq!(map.as_slice(), &[100, 103]);
    }

    #[test]
    fn test_query_gap_is_deletion() {
        let map = build_site_map("ATGCATGGG", "ATG---GGG", 10).unwrap();
        assert_eq!(map.as_slice(), &[10, DELETION, 13]);
        assert_eq!(map.position(1), GenomicPosition::Deletion);
        assert_eq!(map.position(2), GenomicPosition::Mapped(13));
        assert_eq!(map.position(3), GenomicPosition::NotAvailable);
    }

    #[test]
    fn test_reference_gap_codons_are_skipped() {
        let map = build_site_map("ATG---CAT", "ATGCAT", 0).unwrap();
        assert_eq!(map.as_slice(), &[0, 6]);
    }

    #[test]
    fn test_all_gap_query_ignores_reference() {
        let map = build_site_map("", "------", 0).unwrap();
        assert_eq!(map.as_slice(), &[DELETION, DELETION]);
    }

    #[test]
    fn test_query_longer_than_reference_is_error() {
        let err = build_site_map("ATG", "ATGCAT", 0).unwrap_err();
        assert!(matches!(err, ReportError::InternalConsistency(_)));
    }

    #[test]
    fn test_serialises_as_array() {
        let map = SiteMap::new(vec![3, -1]);
        assert_eq!(serde_json::to_string(&map).unwrap(), "[3,-1]");
    }
}

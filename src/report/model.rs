use crate::coordinates::{GeneSite, SiteMap};
use crate::tree::NodeTags;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Annotation records keyed by genomic coordinate.
pub type AnnotationMap = BTreeMap<u64, AnnotationRecord>;

/// Summary records keyed by gene/segment.
pub type SummaryMap = BTreeMap<String, SummaryRecord>;

/// Per-lineage-tag tallies of codons or residues at one site.
pub type SubstitutionCounts = BTreeMap<String, BTreeMap<String, u64>>;

/// Keeps an explicit `null` distinct from an absent field.
fn deserialize_present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Everything reported for one genomic coordinate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    #[serde(rename = "G")]
    pub gene: String,
    #[serde(rename = "S")]
    pub gene_site: GeneSite,
    /// Codon index in the query alignment.
    #[serde(rename = "index")]
    pub query_index: usize,
    #[serde(rename = "bCFEL", default, skip_serializing_if = "Option::is_none")]
    pub cfel: Option<CfelSite>,
    #[serde(rename = "bFEL", default, skip_serializing_if = "Option::is_none")]
    pub fel: Option<FelSite>,
    #[serde(rename = "bMEME", default, skip_serializing_if = "Option::is_none")]
    pub meme: Option<MemeSite>,
    #[serde(rename = "lMEME", default, skip_serializing_if = "Option::is_none")]
    pub meme_full: Option<MemeSite>,
    /// `Some(None)` marks an invariable site.
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub prime: Option<Option<PrimeSite>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fade: Option<BTreeMap<String, FadeSite>>,
    #[serde(rename = "cdn", default, skip_serializing_if = "Option::is_none")]
    pub codons: Option<SubstitutionCounts>,
    #[serde(rename = "aa", default, skip_serializing_if = "Option::is_none")]
    pub amino_acids: Option<SubstitutionCounts>,
}

impl AnnotationRecord {
    pub fn new(gene: String, gene_site: GeneSite, query_index: usize) -> Self {
        Self {
            gene,
            gene_site,
            query_index,
            ..Default::default()
        }
    }
}

/// Contrast-FEL estimates; per-category maps are keyed by the name found in
/// the column header.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CfelSite {
    #[serde(rename = "a")]
    pub alpha: f64,
    #[serde(rename = "b")]
    pub beta: BTreeMap<String, f64>,
    #[serde(rename = "p")]
    pub p_values: BTreeMap<String, f64>,
    #[serde(rename = "pp")]
    pub permutation_p: f64,
    #[serde(rename = "s")]
    pub substitutions: BTreeMap<String, f64>,
    #[serde(rename = "q")]
    pub q_value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FelSite {
    #[serde(rename = "a")]
    pub alpha: f64,
    #[serde(rename = "b")]
    pub beta: f64,
    #[serde(rename = "p")]
    pub p_value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemeSite {
    #[serde(rename = "p")]
    pub p_value: f64,
    #[serde(rename = "a")]
    pub alpha: f64,
    #[serde(rename = "b+")]
    pub beta_plus: f64,
    #[serde(rename = "w+")]
    pub weight_plus: f64,
    #[serde(rename = "b-")]
    pub beta_minus: f64,
    #[serde(rename = "w-")]
    pub weight_minus: f64,
    /// Number of branches under selection.
    #[serde(rename = "br")]
    pub branches: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrimeSite {
    /// Overall p-value followed by one per property.
    pub p: Vec<f64>,
    pub lambda: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FadeSite {
    pub rate: f64,
    #[serde(rename = "BF")]
    pub bayes_factor: f64,
}

/// Everything reported for one gene/segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<SiteMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree_tags: Option<NodeTags>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rates: Option<Rates>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relax: Option<RelaxTest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub busted: Option<BustedTest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bgm: Option<Value>,
    #[serde(rename = "prime-properties", default, skip_serializing_if = "Option::is_none")]
    pub prime_properties: Option<Vec<String>>,
    /// Per coordinate, the codon of every node whose codon differs from its parent's.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subs: Option<BTreeMap<u64, BTreeMap<String, String>>>,
}

/// Rate summaries per branch category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rates {
    #[serde(rename = "mean-omega")]
    pub mean_omega: BTreeMap<String, f64>,
    /// Total tested branch length.
    #[serde(rename = "T")]
    pub total_length: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relax: Option<BTreeMap<String, Vec<Value>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub busted: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelaxTest {
    pub p: f64,
    /// Relaxation (K < 1) or intensification (K > 1) parameter.
    #[serde(rename = "K")]
    pub k: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BustedTest {
    pub p: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_annotation_wire_names() {
        let mut record = AnnotationRecord::new("HA".to_string(), GeneSite::Codon(4), 7);
        record.fel = Some(FelSite {
            alpha: 1.0,
            beta: 2.0,
            p_value: 0.01,
        });
        record.prime = Some(None);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({"G": "HA", "S": 4, "index": 7, "bFEL": {"a": 1.0, "b": 2.0, "p": 0.01}, "prime": null})
        );
    }

    #[test]
    fn test_invariable_prime_survives_reload() {
        let loaded: AnnotationRecord =
            serde_json::from_value(json!({"G": "", "S": "Not in genome (deletion)", "index": 0, "prime": null}))
                .unwrap();
        assert_eq!(loaded.prime, Some(None));
        assert_eq!(loaded.gene_site, GeneSite::Description("Not in genome (deletion)".to_string()));

        let loaded: AnnotationRecord = serde_json::from_value(json!({"G": "HA", "S": 1, "index": 0})).unwrap();
        assert_eq!(loaded.prime, None);
    }

    #[test]
    fn test_empty_summary_serialises_empty() {
        let summary = SummaryRecord::default();
        assert_eq!(serde_json::to_string(&summary).unwrap(), "{}");
    }
}

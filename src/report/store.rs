use super::model::{AnnotationMap, SummaryMap};
use crate::error::ReportResult;
use crate::utils::io;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

/// The two accumulated reports of a run.
///
/// Loaded once before the first input file, written once at the end. Keys
/// are ordered, so identical content always serialises to identical bytes.
/// Earlier records that no longer read as reports are carried through
/// untouched unless this run rewrites their key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportStore {
    pub annotation: AnnotationMap,
    pub summary: SummaryMap,
    kept_annotation: BTreeMap<u64, Value>,
    kept_summary: BTreeMap<String, Value>,
}

impl ReportStore {
    /// Start from earlier reports; a missing or unreadable file starts empty.
    pub fn load(annotation_path: &Path, summary_path: &Path) -> Self {
        let (annotation, kept_annotation) = load_records(annotation_path);
        let (summary, kept_summary) = load_records(summary_path);
        Self {
            annotation,
            summary,
            kept_annotation,
            kept_summary,
        }
    }

    /// Number of earlier records carried through without being read.
    pub fn kept_len(&self) -> usize {
        self.kept_annotation.len() + self.kept_summary.len()
    }

    pub fn write(&self, annotation_path: &Path, summary_path: &Path) -> ReportResult<()> {
        tracing::info!("Writing {} annotated sites to {}", self.annotation.len(), annotation_path.display());
        write_pretty(annotation_path, &merged(&self.annotation, &self.kept_annotation))?;
        tracing::info!("Writing {} summaries to {}", self.summary.len(), summary_path.display());
        write_pretty(summary_path, &merged(&self.summary, &self.kept_summary))
    }
}

type Records<K, T> = (BTreeMap<K, T>, BTreeMap<K, Value>);

/// Read a report one record at a time. Records that do not deserialize are
/// returned raw, so a single stale entry never costs the rest of the file.
fn load_records<K, T>(path: &Path) -> Records<K, T>
where
    K: FromStr + Ord,
    T: DeserializeOwned,
{
    let mut records = BTreeMap::new();
    let mut kept = BTreeMap::new();
    if io::is_missing_or_empty(path) {
        tracing::info!("No existing report at {}, starting empty", path.display());
        return (records, kept);
    }
    let parsed = io::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|contents| serde_json::from_str::<Map<String, Value>>(&contents).map_err(|e| e.to_string()));
    let document = match parsed {
        Ok(document) => document,
        Err(e) => {
            tracing::warn!("Ignoring unreadable report {}: {}", path.display(), e);
            return (records, kept);
        }
    };

    for (key, value) in document {
        let Ok(parsed_key) = key.parse::<K>() else {
            tracing::warn!("Dropping record '{}' from {}: not a valid key", key, path.display());
            continue;
        };
        match T::deserialize(&value) {
            Ok(record) => {
                records.insert(parsed_key, record);
            }
            Err(e) => {
                tracing::warn!("Keeping record '{}' of {} as is: {}", key, path.display(), e);
                kept.insert(parsed_key, value);
            }
        }
    }
    (records, kept)
}

#[derive(Serialize)]
#[serde(untagged)]
enum Stored<'a, T> {
    Record(&'a T),
    Kept(&'a Value),
}

/// Kept raw records, overridden by any record of the same key.
fn merged<'a, K: Ord, T>(records: &'a BTreeMap<K, T>, kept: &'a BTreeMap<K, Value>) -> BTreeMap<&'a K, Stored<'a, T>> {
    let mut out: BTreeMap<&K, Stored<T>> = kept.iter().map(|(k, v)| (k, Stored::Kept(v))).collect();
    out.extend(records.iter().map(|(k, r)| (k, Stored::Record(r))));
    out
}

fn write_pretty<T: Serialize>(path: &Path, value: &T) -> ReportResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value).map_err(std::io::Error::from)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinates::GeneSite;
    use crate::report::model::{AnnotationRecord, SummaryRecord};
    use serde_json::json;

    #[test]
    fn test_round_trip_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let (a, s) = (dir.path().join("a.json"), dir.path().join("s.json"));

        let mut store = ReportStore::default();
        store.annotation.insert(1000, AnnotationRecord::new("HA".to_string(), GeneSite::Codon(324), 2));
        store.annotation.insert(99, AnnotationRecord::new("HA".to_string(), GeneSite::Codon(24), 1));
        store.summary.insert("HA".to_string(), SummaryRecord {
            tree: Some("(a,b);".to_string()),
            ..Default::default()
        });
        store.write(&a, &s).unwrap();
        let first = std::fs::read(&a).unwrap();

        let reloaded = ReportStore::load(&a, &s);
        assert_eq!(reloaded, store);
        reloaded.write(&a, &s).unwrap();
        assert_eq!(std::fs::read(&a).unwrap(), first);

        // Numeric, not lexical, key order.
        let text = String::from_utf8(first).unwrap();
        assert!(text.find("\"99\"").unwrap() < text.find("\"1000\"").unwrap());
    }

    #[test]
    fn test_unreadable_record_is_kept_beside_valid_ones() {
        let dir = tempfile::tempdir().unwrap();
        let (a, s) = (dir.path().join("a.json"), dir.path().join("s.json"));
        let stale = json!({"G": "PB2", "S": 3, "index": 2, "bFEL": {"a": 1.0, "b": 2.0}});
        std::fs::write(&a, json!({"500": stale, "30": {"G": "HA", "S": 1, "index": 0}}).to_string()).unwrap();

        let mut store = ReportStore::load(&a, &s);
        assert_eq!(store.annotation.len(), 1);
        assert_eq!(store.kept_len(), 1);
        store.write(&a, &s).unwrap();
        let written: Value = serde_json::from_str(&std::fs::read_to_string(&a).unwrap()).unwrap();
        assert_eq!(written["500"], stale);
        assert_eq!(written["30"]["G"], json!("HA"));

        // A record written by this run replaces the stale one.
        store.annotation.insert(500, AnnotationRecord::new("HA".to_string(), GeneSite::Codon(157), 9));
        store.write(&a, &s).unwrap();
        let written: Value = serde_json::from_str(&std::fs::read_to_string(&a).unwrap()).unwrap();
        assert_eq!(written["500"], json!({"G": "HA", "S": 157, "index": 9}));
    }

    #[test]
    fn test_positional_tree_tags_load() {
        let dir = tempfile::tempdir().unwrap();
        let s = dir.path().join("s.json");
        let summary = json!({"HA": {"tree": "(a,b)n1;", "tree_tags": {"a": ["Test", false, 0.1], "n1": ["Test", true]}}});
        std::fs::write(&s, summary.to_string()).unwrap();

        let store = ReportStore::load(&dir.path().join("a.json"), &s);
        let tags = store.summary["HA"].tree_tags.as_ref().unwrap();
        assert!(tags["a"].is_leaf);
        assert!(!tags["n1"].is_leaf);
        assert_eq!(store.kept_len(), 0);
    }

    #[test]
    fn test_missing_or_malformed_start_empty() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "[1, 2").unwrap();
        let store = ReportStore::load(&dir.path().join("absent.json"), &bad);
        assert_eq!(store, ReportStore::default());
    }
}

use crate::error::{ReportError, ReportResult};
use crate::utils::io;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// One selection-analysis result file, kept as an untyped JSON document.
///
/// Every accessor names the key path it failed on, so a truncated or
/// foreign file is reported precisely.
#[derive(Debug, Clone)]
pub struct HyphyResult {
    file: String,
    json: Value,
}

impl HyphyResult {
    /// `Ok(None)` when the file does not exist or is empty.
    pub fn load(path: &Path) -> ReportResult<Option<Self>> {
        if io::is_missing_or_empty(path) {
            return Ok(None);
        }
        let contents = io::read_to_string(path)?;
        let json = serde_json::from_str(&contents)
            .map_err(|e| ReportError::malformed(path.display().to_string(), e.to_string()))?;
        Ok(Some(Self {
            file: path.display().to_string(),
            json,
        }))
    }

    pub fn from_value(file: impl Into<String>, json: Value) -> Self {
        Self {
            file: file.into(),
            json,
        }
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub(crate) fn missing(&self, keys: &[&str]) -> ReportError {
        ReportError::malformed(self.file.clone(), format!("missing or mistyped key {}", keys.join("/")))
    }

    pub fn get(&self, keys: &[&str]) -> ReportResult<&Value> {
        keys.iter()
            .try_fold(&self.json, |value, key| value.get(*key))
            .ok_or_else(|| self.missing(keys))
    }

    pub fn object(&self, keys: &[&str]) -> ReportResult<&Map<String, Value>> {
        self.get(keys)?.as_object().ok_or_else(|| self.missing(keys))
    }

    pub fn number(&self, keys: &[&str]) -> ReportResult<f64> {
        self.get(keys)?.as_f64().ok_or_else(|| self.missing(keys))
    }

    /// Tree text of the first partition.
    pub fn tree(&self) -> ReportResult<&str> {
        let keys = ["input", "trees", "0"];
        self.get(&keys)?.as_str().ok_or_else(|| self.missing(&keys))
    }

    /// Per-branch attributes of the first partition.
    pub fn branch_attributes(&self) -> ReportResult<&Map<String, Value>> {
        self.object(&["branch attributes", "0"])
    }

    /// `(name, description)` of every MLE column.
    pub fn mle_headers(&self) -> ReportResult<Vec<(String, String)>> {
        let keys = ["MLE", "headers"];
        let headers = self.get(&keys)?.as_array().ok_or_else(|| self.missing(&keys))?;
        headers
            .iter()
            .map(|header| {
                let name = header.get(0).and_then(Value::as_str);
                let description = header.get(1).and_then(Value::as_str).unwrap_or_default();
                match name {
                    Some(name) => Ok((name.to_string(), description.to_string())),
                    None => Err(self.missing(&keys)),
                }
            })
            .collect()
    }

    /// Per-site rows of the first partition.
    pub fn mle_rows(&self) -> ReportResult<Vec<MleRow<'_>>> {
        self.rows_at(&["MLE", "content", "0"])
    }

    pub fn rows_at(&self, keys: &[&str]) -> ReportResult<Vec<MleRow<'_>>> {
        let rows = self.get(keys)?.as_array().ok_or_else(|| self.missing(keys))?;
        let mut out = Vec::with_capacity(rows.len());
        for (site, row) in rows.iter().enumerate() {
            let values = row.as_array().ok_or_else(|| self.missing(keys))?;
            out.push(MleRow {
                file: &self.file,
                site,
                values,
            });
        }
        Ok(out)
    }
}

/// One site's row of numbers.
#[derive(Debug, Clone, Copy)]
pub struct MleRow<'a> {
    file: &'a str,
    pub site: usize,
    values: &'a [Value],
}

impl<'a> MleRow<'a> {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }

    pub fn at(&self, column: usize) -> ReportResult<f64> {
        self.values
            .get(column)
            .and_then(Value::as_f64)
            .ok_or_else(|| {
                ReportError::malformed(
                    self.file,
                    format!("site {} has no numeric column {}", self.site, column),
                )
            })
    }

    /// `back` columns from the end; `from_end(1)` is the last column.
    pub fn from_end(&self, back: usize) -> ReportResult<f64> {
        match self.values.len().checked_sub(back) {
            Some(column) => self.at(column),
            None => Err(ReportError::malformed(
                self.file,
                format!("site {} has fewer than {} columns", self.site, back),
            )),
        }
    }

    /// Values of `columns`, keyed by their labels.
    pub fn labelled(&self, columns: &[(usize, String)]) -> ReportResult<BTreeMap<String, f64>> {
        let mut out = BTreeMap::new();
        for (column, label) in columns {
            out.insert(label.clone(), self.at(*column)?);
        }
        Ok(out)
    }
}

/// Column indices of the per-category fields in a contrast-FEL table,
/// labelled by the category named in each header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderColumns {
    pub beta: Vec<(usize, String)>,
    pub p_value: Vec<(usize, String)>,
    pub substitutions: Vec<(usize, String)>,
}

impl HeaderColumns {
    pub fn discover(headers: &[(String, String)]) -> ReportResult<Self> {
        let parens = Regex::new(r"\(|\)").map_err(|e| ReportError::InternalConsistency(e.to_string()))?;
        let parens_or_for =
            Regex::new(r"\(|\)|for ").map_err(|e| ReportError::InternalConsistency(e.to_string()))?;

        let mut columns = Self::default();
        for (i, (name, _)) in headers.iter().enumerate() {
            if name.starts_with("beta") {
                columns.beta.push((i, label(&parens, name)));
            } else if name.starts_with("P-value") {
                columns.p_value.push((i, label(&parens_or_for, name)));
            } else if name.starts_with("subs") {
                columns.substitutions.push((i, label(&parens, name)));
            }
        }
        Ok(columns)
    }
}

/// Text between the first two separators, or the whole name when there is none.
fn label(separator: &Regex, name: &str) -> String {
    separator.split(name).nth(1).unwrap_or(name).to_string()
}

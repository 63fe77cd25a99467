use crate::error::{ReportError, ReportResult};
use crate::utils::io;
use bio::io::fasta;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenomeSegment {
    pub id: String,
    pub sequence: String,
}

impl GenomeSegment {
    pub fn new(id: &str, sequence: &str) -> Self {
        Self {
            id: id.to_string(),
            sequence: sequence.to_string(),
        }
    }
}

/// Reference genome segments in search order.
#[derive(Debug, Clone, Default)]
pub struct ReferenceGenome {
    segments: Vec<GenomeSegment>,
}

impl ReferenceGenome {
    pub fn new(segments: Vec<GenomeSegment>) -> Self {
        Self { segments }
    }

    /// Load every `*.fasta` file in `dir` as one segment, named after the file
    /// up to its first `.`. Files are read in name order.
    pub fn load_dir(dir: &Path) -> ReportResult<Self> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Cannot read reference genome directory {}: {}", dir.display(), e);
                return Ok(Self::default());
            }
        };
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "fasta"))
            .collect();
        files.sort();

        let mut segments = Vec::with_capacity(files.len());
        for file in files {
            let id = file
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.split('.').next())
                .unwrap_or_default()
                .to_string();
            tracing::info!("Loading reference segment {} from {}", id, file.display());
            let record = fasta::Reader::new(io::open(&file)?)
                .records()
                .next()
                .transpose()?
                .ok_or_else(|| ReportError::MissingInput(file.clone()))?;
            segments.push(GenomeSegment {
                id,
                sequence: String::from_utf8_lossy(record.seq()).into_owned(),
            });
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[GenomeSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Header line of a record as written in the file: id, then description.
fn description(record: &fasta::Record) -> String {
    match record.desc() {
        Some(desc) => format!("{} {}", record.id(), desc),
        None => record.id().to_string(),
    }
}

/// The upper-cased, still gapped sequence of the first record in an
/// alignment file whose header matches `pattern`.
pub fn find_query_sequence(path: &Path, pattern: &Regex) -> ReportResult<Option<String>> {
    let reader = fasta::Reader::new(io::open(path)?);
    let mut found: Option<String> = None;
    for record in reader.records() {
        let record = record?;
        let header = description(&record);
        if !pattern.is_match(&header) {
            continue;
        }
        if found.is_some() {
            tracing::warn!("Ignoring additional reference record '{}' in {}", header, path.display());
            continue;
        }
        found = Some(String::from_utf8_lossy(record.seq()).to_ascii_uppercase());
    }
    Ok(found)
}

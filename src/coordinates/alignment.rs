use super::genome::{GenomeSegment, ReferenceGenome};
use crate::error::{ReportError, ReportResult};
use bio::alignment::pairwise::Aligner;
use bio::alignment::AlignmentOperation::{self, Del, Ins, Match, Subst, Xclip, Yclip};

/// The query projected onto one genome segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentAlignment {
    pub segment: String,
    /// Query bases in segment coordinates, `-` where the segment has a base
    /// the query lacks. Query insertions are dropped.
    pub gapped_reference: String,
    /// 0-based segment position of the first aligned base.
    pub offset: usize,
    pub identity: f64,
}

/// Aligns a query sequence against one segment, returning `None` when the
/// segment is not a plausible match.
pub trait SegmentAligner {
    fn align(&self, segment: &GenomeSegment, query: &str) -> ReportResult<Option<SegmentAlignment>>;
}

/// Affine-gap semiglobal aligner from `bio`: the whole query against any
/// stretch of the segment.
#[derive(Debug, Clone)]
pub struct BioSegmentAligner {
    pub gap_open: i32,
    pub gap_extend: i32,
    pub match_score: i32,
    pub mismatch_score: i32,
    /// Alignments with a lower fraction of identical columns are rejected.
    pub min_identity: f64,
}

impl Default for BioSegmentAligner {
    fn default() -> Self {
        Self {
            gap_open: -10,
            gap_extend: -1,
            match_score: 5,
            mismatch_score: -4,
            min_identity: 0.6,
        }
    }
}

impl BioSegmentAligner {
    pub fn with_min_identity(mut self, min_identity: f64) -> Self {
        self.min_identity = min_identity;
        self
    }
}

impl SegmentAligner for BioSegmentAligner {
    fn align(&self, segment: &GenomeSegment, query: &str) -> ReportResult<Option<SegmentAlignment>> {
        let query: Vec<u8> = query
            .bytes()
            .filter(|&b| b != b'-')
            .map(|b| b.to_ascii_uppercase())
            .collect();
        let target = segment.sequence.to_ascii_uppercase().into_bytes();
        if query.is_empty() || target.is_empty() {
            return Ok(None);
        }

        let (match_score, mismatch_score) = (self.match_score, self.mismatch_score);
        let score = |a: u8, b: u8| if a == b { match_score } else { mismatch_score };
        let mut aligner = Aligner::with_capacity(query.len(), target.len(), self.gap_open, self.gap_extend, score);
        let alignment = aligner.semiglobal(&query, &target);

        let (projected, matches, columns) = project(&segment.id, &query, alignment.xstart, &alignment.operations)?;
        if columns == 0 {
            return Ok(None);
        }

        let identity = matches as f64 / columns as f64;
        if identity < self.min_identity {
            tracing::debug!(
                "Segment {} rejected: identity {:.3} below {:.3}",
                segment.id,
                identity,
                self.min_identity
            );
            return Ok(None);
        }

        let leading = projected.len() - projected.trim_start_matches('-').len();
        let gapped_reference = projected.trim_matches('-').to_string();
        Ok(Some(SegmentAlignment {
            segment: segment.id.clone(),
            gapped_reference,
            offset: alignment.ystart + leading,
            identity,
        }))
    }
}

/// Query bases laid out in segment columns, with the match and column counts.
fn project(
    segment_id: &str,
    query: &[u8],
    xstart: usize,
    operations: &[AlignmentOperation],
) -> ReportResult<(String, usize, usize)> {
    let query_base = |x: usize| {
        query.get(x).map(|&b| b as char).ok_or_else(|| {
            ReportError::Alignment(format!(
                "operations against {} run past the {} query bases",
                segment_id,
                query.len()
            ))
        })
    };
    let mut projected = String::with_capacity(operations.len());
    let mut x = xstart;
    let (mut matches, mut columns) = (0usize, 0usize);
    for op in operations {
        match op {
            Match => {
                projected.push(query_base(x)?);
                matches += 1;
                columns += 1;
                x += 1;
            }
            Subst => {
                projected.push(query_base(x)?);
                columns += 1;
                x += 1;
            }
            Del => {
                projected.push('-');
                columns += 1;
            }
            Ins => {
                columns += 1;
                x += 1;
            }
            Xclip(n) => x += n,
            Yclip(_) => {}
        }
    }
    Ok((projected, matches, columns))
}

/// Try each segment in genome order until one accepts the query.
pub fn align_to_genome<A: SegmentAligner + ?Sized>(
    aligner: &A,
    genome: &ReferenceGenome,
    query: &str,
) -> ReportResult<Option<SegmentAlignment>> {
    for segment in genome.segments() {
        if let Some(alignment) = aligner.align(segment, query)? {
            tracing::info!(
                "Query aligned to {} at offset {} (identity {:.3})",
                alignment.segment,
                alignment.offset,
                alignment.identity
            );
            return Ok(Some(alignment));
        }
    }
    Ok(None)
}

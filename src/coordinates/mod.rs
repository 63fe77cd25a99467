//! Mapping query codons onto genome coordinates and genes.

mod alignment;
mod genes;
mod genome;
mod site_map;

pub use alignment::{align_to_genome, BioSegmentAligner, SegmentAligner, SegmentAlignment};
pub use genes::{
    resolve_gene_site, GeneCoordinateEntry, GeneSite, GeneTable, SiteCoordinate, DELETION_SITE, NOT_AVAILABLE,
    NOT_MAPPED,
};
pub use genome::{find_query_sequence, GenomeSegment, ReferenceGenome};
pub use site_map::{build_site_map, GenomicPosition, SiteMap, DELETION};

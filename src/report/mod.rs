//! Merging selection-analysis results into the annotation and summary reports.

pub mod context;
pub mod handlers;
pub mod hyphy;
pub mod model;
pub mod store;

pub use context::{ReportSettings, RunContext, SiteReportEntry};
pub use handlers::{empirical_bayes_factor, process_file, run_all, MemeVariant, ResultKind};
pub use hyphy::{HeaderColumns, HyphyResult, MleRow};
pub use model::{AnnotationMap, AnnotationRecord, SummaryMap, SummaryRecord};
pub use store::ReportStore;

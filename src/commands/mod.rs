pub mod check_topology;
pub mod report;

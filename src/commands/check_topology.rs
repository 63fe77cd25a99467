use crate::error::ReportError;
use crate::report::HyphyResult;
use crate::tree::{match_node_names, parse_tree, TreeNode};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;

/// Check that two result files carry the same tree and print how the
/// reference tree's internal nodes are named in the query tree.
pub fn run(query: &Path, reference: &Path) -> Result<()> {
    let query_tree = load_tree(query)?;
    let reference_tree = load_tree(reference)?;

    let mut mapping = BTreeMap::new();
    match_node_names(&query_tree, &reference_tree, &mut mapping)
        .with_context(|| format!("{} and {} disagree", query.display(), reference.display()))?;

    for (reference_name, query_name) in &mapping {
        println!("{}\t{}", reference_name, query_name);
    }
    tracing::info!("Topologies match; {} internal nodes mapped", mapping.len());
    Ok(())
}

fn load_tree(path: &Path) -> Result<TreeNode> {
    let result = HyphyResult::load(path)?.ok_or_else(|| ReportError::MissingInput(path.to_path_buf()))?;
    let parsed = parse_tree(result.tree()?, false, None)
        .map_err(ReportError::from)
        .with_context(|| format!("Malformed tree in {}", path.display()))?;
    Ok(parsed.root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_result(dir: &Path, name: &str, tree: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, json!({"input": {"trees": {"0": tree}}}).to_string()).unwrap();
        path
    }

    #[test]
    fn test_matching_and_mismatching_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_result(dir.path(), "a.json", "((x,y)Node1,z);");
        let b = write_result(dir.path(), "b.json", "((x,y)N7,z);");
        let c = write_result(dir.path(), "c.json", "((x,z)N7,y);");
        assert!(run(&a, &b).is_ok());
        assert!(run(&a, &c).is_err());
        assert!(run(&a, &dir.path().join("missing.json")).is_err());
    }
}

use super::TreeNode;
use crate::error::{ReportError, ReportResult};
use std::collections::BTreeMap;

/// Walk two trees in lockstep and map the reference tree's internal node
/// names onto the query tree's.
///
/// Both trees must have the same shape, child order and leaf names; any
/// difference is a [ReportError::TopologyMismatch]. Nothing in the report
/// pipeline calls this implicitly.
pub fn match_node_names(
    query: &TreeNode,
    reference: &TreeNode,
    mapping: &mut BTreeMap<String, String>,
) -> ReportResult<()> {
    match (query.is_leaf(), reference.is_leaf()) {
        (false, false) => {
            mapping.insert(reference.name.clone(), query.name.clone());
            if query.children.len() != reference.children.len() {
                return Err(ReportError::TopologyMismatch(format!(
                    "internal node '{}' has {} children, reference node '{}' has {}",
                    query.name,
                    query.children.len(),
                    reference.name,
                    reference.children.len()
                )));
            }
            for (q, r) in query.children.iter().zip(&reference.children) {
                match_node_names(q, r, mapping)?;
            }
            Ok(())
        }
        (false, true) | (true, false) => Err(ReportError::TopologyMismatch(format!(
            "'{}' and '{}' differ in being a leaf",
            query.name, reference.name
        ))),
        (true, true) => {
            if query.name != reference.name {
                return Err(ReportError::TopologyMismatch(format!(
                    "leaf name mismatch: '{}' vs '{}'",
                    query.name, reference.name
                )));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::parse_tree;

    fn tree(text: &str) -> TreeNode {
        parse_tree(text, false, None).unwrap().root
    }

    #[test]
    fn test_matching_trees_map_internal_names() {
        let query = tree("((a,b)q1,c);");
        let reference = tree("((a,b)Node2,c);");
        let mut mapping = BTreeMap::new();
        match_node_names(&query, &reference, &mut mapping).unwrap();
        assert_eq!(mapping.get("Node2").map(String::as_str), Some("q1"));
        assert_eq!(mapping.get("root").map(String::as_str), Some("root"));
    }

    #[test]
    fn test_mismatches_are_errors() {
        let mut mapping = BTreeMap::new();
        let err = match_node_names(&tree("((a,b),c);"), &tree("((a,c),b);"), &mut mapping);
        assert!(matches!(err, Err(ReportError::TopologyMismatch(_))));

        let err = match_node_names(&tree("((a,b),c);"), &tree("(a,b,c);"), &mut mapping);
        assert!(matches!(err, Err(ReportError::TopologyMismatch(_))));

        let err = match_node_names(&tree("((a,b),c);"), &tree("(d,(a,b));"), &mut mapping);
        assert!(matches!(err, Err(ReportError::TopologyMismatch(_))));
    }
}

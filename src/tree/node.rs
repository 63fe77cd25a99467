/// One node of a parsed phylogenetic tree.
///
/// Children are owned in parse order; there are no parent links. Traversals
/// that need the parent's state carry it as a parameter instead.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeNode {
    pub name: String,
    /// Support value text, only set for internal nodes when the parser was
    /// asked to read internal labels as bootstrap values.
    pub bootstrap: Option<String>,
    /// Raw text following `:`; kept opaque.
    pub branch_length: String,
    /// Content of a bracketed comment such as `[&&NHX:...]`.
    pub annotation: String,
    pub children: Vec<TreeNode>,
    /// Lineage tag, empty when the node cannot be assigned one.
    pub tag: String,
    /// 1-based position among siblings at creation time.
    pub original_child_order: usize,
}

impl TreeNode {
    pub const ROOT_NAME: &'static str = "root";

    pub(crate) fn root() -> Self {
        Self {
            name: Self::ROOT_NAME.to_string(),
            ..Default::default()
        }
    }

    pub(crate) fn with_child_order(order: usize) -> Self {
        Self {
            original_child_order: order,
            ..Default::default()
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.name == Self::ROOT_NAME
    }

    pub fn leaf_count(&self) -> usize {
        if self.is_leaf() {
            1
        } else {
            self.children.iter().map(TreeNode::leaf_count).sum()
        }
    }

    /// Leaf names in left-to-right order.
    pub fn leaf_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_leaf_names(&mut names);
        names
    }

    fn collect_leaf_names<'a>(&'a self, names: &mut Vec<&'a str>) {
        if self.is_leaf() {
            names.push(&self.name);
        }
        for child in &self.children {
            child.collect_leaf_names(names);
        }
    }

    /// Depth-first search for a node by name.
    pub fn find(&self, name: &str) -> Option<&TreeNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }
}

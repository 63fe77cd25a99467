//! Tree-text parsing and lineage tagging.

mod node;
mod parse_error;
mod parser;
mod tags;
mod topology;

pub use node::TreeNode;
pub use parse_error::{ParseError, ParseErrorKind};
pub use parser::{parse_tree, ParsedTree, TreeParser};
pub use tags::{resolve_internal_tag, resolve_leaf_tag, NodeTag, NodeTags, TagPropagator, TagTable};
pub use topology::match_node_names;

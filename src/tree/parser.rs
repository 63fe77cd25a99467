use super::node::TreeNode;
use super::parse_error::{ParseError, ParseErrorKind};
use super::tags::{resolve_internal_tag, NodeTag, NodeTags, TagPropagator};
use std::mem;

/// Reader state of the tree-text automaton.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Skipping input until the first `(`.
    Start,
    /// Reading a node name.
    Label,
    /// Reading text after `:`.
    BranchLength,
    /// Inside a quoted name.
    Quoted,
    /// Saw the closing quote; a second one would make it an escaped quote.
    QuoteClosing,
    /// Inside `[...]`.
    Comment,
    /// `;` was read, everything after it is ignored.
    Done,
}

/// Result of parsing one tree string.
#[derive(Debug, Clone)]
pub struct ParsedTree {
    pub root: TreeNode,
    /// Tag and leaf flag of every finished node, keyed by node name.
    pub node_tags: NodeTags,
}

/// Character-at-a-time parser for nested-parenthesis tree text.
///
/// Accepts names, `:`-prefixed branch lengths, `[...]` comments and names
/// quoted with `'` or `"` (a doubled quote inside a quoted name is a literal
/// quote). Tags are assigned as each node is closed, so an internal node sees
/// the final tags of all its children.
///
/// # Example
/// ```
/// use selection_report::tree::TreeParser;
///
/// let mut parser = TreeParser::new();
/// for c in "((a:1,b:2)n1:3,c:4);".chars() {
///     parser.step(c).unwrap();
/// }
/// let tree = parser.finish().unwrap();
/// assert_eq!(tree.root.leaf_count(), 3);
/// ```
pub struct TreeParser<'a> {
    state: State,
    /// Open nodes, innermost last; the synthetic root is always at the bottom.
    stack: Vec<TreeNode>,
    current_name: String,
    current_attribute: String,
    current_annotation: String,
    quote_delimiter: char,
    position: usize,
    internal_labels_as_bootstrap: bool,
    tagger: Option<&'a TagPropagator<'a>>,
    node_tags: NodeTags,
}

impl Default for TreeParser<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> TreeParser<'a> {
    pub fn new() -> Self {
        Self {
            state: State::Start,
            stack: vec![TreeNode::root()],
            current_name: String::new(),
            current_attribute: String::new(),
            current_annotation: String::new(),
            quote_delimiter: '\'',
            position: 0,
            internal_labels_as_bootstrap: false,
            tagger: None,
            node_tags: NodeTags::new(),
        }
    }

    /// Store labels of internal nodes as bootstrap values instead of names.
    pub fn with_bootstrap_values(mut self, enabled: bool) -> Self {
        self.internal_labels_as_bootstrap = enabled;
        self
    }

    pub fn with_tagger(mut self, tagger: &'a TagPropagator<'a>) -> Self {
        self.tagger = Some(tagger);
        self
    }

    /// Feed the next character of the tree text.
    pub fn step(&mut self, c: char) -> Result<(), ParseError> {
        let position = self.position;
        self.position += 1;
        self.dispatch(c, position)
    }

    fn dispatch(&mut self, c: char, position: usize) -> Result<(), ParseError> {
        match self.state {
            State::Start => {
                if c == '(' {
                    self.open_node();
                    self.state = State::Label;
                }
                Ok(())
            }
            State::Label | State::BranchLength => self.read_label(c, position),
            State::Quoted => {
                if c == self.quote_delimiter {
                    self.state = State::QuoteClosing;
                } else {
                    self.current_name.push(c);
                }
                Ok(())
            }
            State::QuoteClosing => {
                if c == self.quote_delimiter {
                    self.current_name.push(c);
                    self.state = State::Quoted;
                    Ok(())
                } else {
                    self.state = State::Label;
                    self.read_label(c, position)
                }
            }
            State::Comment => {
                match c {
                    ']' => self.state = State::BranchLength,
                    '[' => return Err(ParseError::new(ParseErrorKind::NestedComment, position, Some(c))),
                    _ => self.current_annotation.push(c),
                }
                Ok(())
            }
            State::Done => Ok(()),
        }
    }

    fn read_label(&mut self, c: char, position: usize) -> Result<(), ParseError> {
        match c {
            ':' => self.state = State::BranchLength,
            ',' | ')' => {
                self.finish_node(position, c)?;
                self.state = State::Label;
                if c == ',' {
                    self.open_node();
                }
            }
            '(' => {
                if !self.current_name.is_empty() {
                    return Err(ParseError::new(ParseErrorKind::OpenAfterLabel, position, Some(c)));
                }
                self.open_node();
            }
            '\'' | '"' => {
                let fresh = self.state == State::Label
                    && self.current_name.is_empty()
                    && self.current_attribute.is_empty()
                    && self.current_annotation.is_empty();
                if !fresh {
                    return Err(ParseError::new(ParseErrorKind::MisplacedQuote, position, Some(c)));
                }
                self.quote_delimiter = c;
                self.state = State::Quoted;
            }
            '[' => {
                if !self.current_annotation.is_empty() {
                    return Err(ParseError::new(ParseErrorKind::DuplicateComment, position, Some(c)));
                }
                self.state = State::Comment;
            }
            ';' => self.state = State::Done,
            _ if self.state == State::BranchLength => self.current_attribute.push(c),
            _ if c.is_whitespace() => {}
            _ => self.current_name.push(c),
        }
        Ok(())
    }

    /// Push a new node as the next child of the current innermost node.
    fn open_node(&mut self) {
        let order = self.stack.last().map_or(1, |parent| parent.children.len() + 1);
        self.stack.push(TreeNode::with_child_order(order));
    }

    /// Close the innermost node, assign its tag and attach it to its parent.
    fn finish_node(&mut self, position: usize, c: char) -> Result<(), ParseError> {
        if self.stack.len() < 2 {
            return Err(ParseError::new(ParseErrorKind::UnbalancedParentheses, position, Some(c)));
        }
        let Some(mut node) = self.stack.pop() else {
            return Err(ParseError::new(ParseErrorKind::UnbalancedParentheses, position, Some(c)));
        };

        let label = mem::take(&mut self.current_name);
        if self.internal_labels_as_bootstrap && !node.is_leaf() {
            node.bootstrap = Some(label);
        } else {
            node.name = label;
        }
        node.branch_length = mem::take(&mut self.current_attribute);
        node.annotation = mem::take(&mut self.current_annotation);

        node.tag = if node.is_leaf() {
            self.tagger.map(|t| t.leaf_tag(&node.name)).unwrap_or_default()
        } else {
            resolve_internal_tag(node.children.iter().map(|c| c.tag.as_str()))
        };
        self.node_tags
            .insert(node.name.clone(), NodeTag::new(node.tag.clone(), node.is_leaf()));

        if let Some(parent) = self.stack.last_mut() {
            parent.children.push(node);
        }
        Ok(())
    }

    /// Validate the end of input and return the tree.
    pub fn finish(mut self) -> Result<ParsedTree, ParseError> {
        let last = self.position.saturating_sub(1);
        match self.state {
            State::Quoted => return Err(ParseError::new(ParseErrorKind::UnterminatedQuote, last, None)),
            State::Comment => return Err(ParseError::new(ParseErrorKind::UnterminatedComment, last, None)),
            _ => {}
        }
        if self.stack.len() != 1 {
            return Err(ParseError::new(ParseErrorKind::UnbalancedParentheses, last, None));
        }
        let mut root = self.stack.pop().unwrap_or_else(TreeNode::root);
        if !self.current_name.is_empty() {
            root.name = mem::take(&mut self.current_name);
        }
        Ok(ParsedTree {
            root,
            node_tags: self.node_tags,
        })
    }
}

/// Parse a complete tree string.
///
/// Errors carry the offending index and the surrounding text.
pub fn parse_tree(
    text: &str,
    internal_labels_as_bootstrap: bool,
    tagger: Option<&TagPropagator>,
) -> Result<ParsedTree, ParseError> {
    let chars: Vec<char> = text.chars().collect();
    let mut parser = TreeParser::new().with_bootstrap_values(internal_labels_as_bootstrap);
    if let Some(tagger) = tagger {
        parser = parser.with_tagger(tagger);
    }
    for &c in &chars {
        parser.step(c).map_err(|e| e.with_context(&chars))?;
        if parser.state == State::Done {
            break;
        }
    }
    parser.finish().map_err(|e| e.with_context(&chars))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::TagTable;

    fn parse(text: &str) -> Result<ParsedTree, ParseError> {
        parse_tree(text, false, None)
    }

    #[test]
    fn test_parse_nested_tree() {
        let tree = parse("((a:1,b:2)n1:3,c:4);").unwrap();
        let root = &tree.root;
        assert_eq!(root.name, "root");
        assert_eq!(root.children.len(), 2);

        let n1 = &root.children[0];
        assert_eq!(n1.name, "n1");
        assert_eq!(n1.branch_length, "3");
        assert_eq!(n1.original_child_order, 1);
        assert_eq!(n1.children[1].name, "b");
        assert_eq!(n1.children[1].branch_length, "2");
        assert_eq!(n1.children[1].original_child_order, 2);

        assert_eq!(root.children[1].name, "c");
        assert_eq!(root.leaf_names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_escaped_quote_in_name() {
        let tree = parse("(('a''b':1,c:2):3);").unwrap();
        let inner = &tree.root.children[0];
        assert_eq!(inner.children[0].name, "a'b");
        assert_eq!(inner.children[0].branch_length, "1");
        assert_eq!(inner.children[1].name, "c");
    }

    #[test]
    fn test_double_quoted_name_keeps_spaces() {
        let tree = parse("(\"A B\":1, c);").unwrap();
        assert_eq!(tree.root.leaf_names(), vec!["A B", "c"]);
    }

    #[test]
    fn test_whitespace_is_skipped_in_names() {
        let tree = parse("( a , b ) ;").unwrap();
        assert_eq!(tree.root.leaf_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_comment_becomes_annotation() {
        let tree = parse("(a[&&NHX:S=x]:1,b);").unwrap();
        let a = &tree.root.children[0];
        assert_eq!(a.annotation, "&&NHX:S=x");
        assert_eq!(a.branch_length, "1");
    }

    #[test]
    fn test_trailing_text_names_root() {
        let tree = parse("(a,b)top").unwrap();
        assert_eq!(tree.root.name, "top");
        assert!(!tree.root.is_root());
    }

    #[test]
    fn test_semicolon_stops_reading() {
        let tree = parse("(a,b);(c,(d").unwrap();
        assert_eq!(tree.root.leaf_count(), 2);
    }

    #[test]
    fn test_degenerate_input_yields_root() {
        let tree = parse("no tree here").unwrap();
        assert!(tree.root.is_leaf());
        assert_eq!(tree.root.name, "root");
    }

    #[test]
    fn test_bootstrap_values() {
        let tree = parse_tree("((a,b)95:0.1,c);", true, None).unwrap();
        let inner = &tree.root.children[0];
        assert_eq!(inner.bootstrap.as_deref(), Some("95"));
        assert_eq!(inner.name, "");
        assert_eq!(inner.branch_length, "0.1");
        assert_eq!(tree.root.children[1].bootstrap, None);
    }

    #[test]
    fn test_open_after_label_is_error() {
        let err = parse("(a(b,c));").unwrap_err();
        assert_eq!(err.kind(), &ParseErrorKind::OpenAfterLabel);
        assert_eq!(err.position(), 2);
        assert_eq!(err.context(), "(a([ERROR HERE]b,c));");
    }

    #[test]
    fn test_comment_errors() {
        let err = parse("(a[x][y],b);").unwrap_err();
        assert_eq!(err.kind(), &ParseErrorKind::DuplicateComment);
        assert_eq!(err.position(), 5);

        let err = parse("(a[x[y]],b);").unwrap_err();
        assert_eq!(err.kind(), &ParseErrorKind::NestedComment);
        assert_eq!(err.position(), 4);

        let err = parse("(a[x,b);").unwrap_err();
        assert_eq!(err.kind(), &ParseErrorKind::UnterminatedComment);
    }

    #[test]
    fn test_quote_errors() {
        let err = parse("(a'b',c);").unwrap_err();
        assert_eq!(err.kind(), &ParseErrorKind::MisplacedQuote);
        assert_eq!(err.position(), 2);

        let err = parse("(a:'1',c);").unwrap_err();
        assert_eq!(err.kind(), &ParseErrorKind::MisplacedQuote);

        let err = parse("('abc,d);").unwrap_err();
        assert_eq!(err.kind(), &ParseErrorKind::UnterminatedQuote);
    }

    #[test]
    fn test_unbalanced_parentheses() {
        let err = parse("((a,b);").unwrap_err();
        assert_eq!(err.kind(), &ParseErrorKind::UnbalancedParentheses);
        assert_eq!(err.position(), 6);

        let err = parse("(a,b));").unwrap_err();
        assert_eq!(err.kind(), &ParseErrorKind::UnbalancedParentheses);
        assert_eq!(err.position(), 5);
    }

    #[test]
    fn test_tags_assigned_during_parse() {
        let table = TagTable::new(vec![
            ("swine".to_string(), "Swine".to_string()),
            ("human".to_string(), "Human".to_string()),
        ]);
        let tagger = TagPropagator::new(&table, "Reference");
        let tree = parse_tree(
            "(((a_swine,b_swine)n1,(c_human,d_swine)n2)n3,e)n4;",
            false,
            Some(&tagger),
        )
        .unwrap();

        let tags = &tree.node_tags;
        assert_eq!(tags["a_swine"].tag, "Swine");
        assert!(tags["a_swine"].is_leaf);
        assert_eq!(tags["e"].tag, "Reference");
        assert_eq!(tags["n1"].tag, "Swine");
        assert!(!tags["n1"].is_leaf);
        assert_eq!(tags["n2"].tag, "");
        assert_eq!(tags["n3"].tag, "");
        assert_eq!(tree.root.name, "n4");

        let n1 = tree.root.find("n1").unwrap();
        assert_eq!(n1.tag, "Swine");
    }

    #[test]
    fn test_step_api_matches_parse_tree() {
        let text = "((x:0.1,y:0.2):0.3,z:0.4);";
        let mut parser = TreeParser::new();
        for c in text.chars() {
            parser.step(c).unwrap();
        }
        let stepped = parser.finish().unwrap();
        let parsed = parse(text).unwrap();
        assert_eq!(stepped.root, parsed.root);
    }
}

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// Ordered (name substring, tag) pairs loaded from a `*.labels.json` file.
///
/// The first pattern in table order that occurs anywhere in a leaf name wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagTable {
    entries: Vec<(String, String)>,
}

impl TagTable {
    pub fn new(entries: Vec<(String, String)>) -> Self {
        Self { entries }
    }

    /// Load a label table; a missing or malformed file yields an empty table.
    pub fn load(path: &Path) -> Self {
        let contents = match crate::utils::io::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::info!("No label table at {} ({}), using default tag", path.display(), e);
                return Self::default();
            }
        };
        match serde_json::from_str::<Value>(&contents) {
            Ok(Value::Object(map)) => Self::from_json_map(&map),
            _ => {
                tracing::warn!("Label table {} is not a JSON object, ignoring it", path.display());
                Self::default()
            }
        }
    }

    pub fn from_json_map(map: &Map<String, Value>) -> Self {
        let entries = map
            .iter()
            .filter_map(|(pattern, tag)| match tag {
                Value::String(tag) => Some((pattern.clone(), tag.clone())),
                other => {
                    tracing::warn!("Ignoring non-string tag {} for pattern '{}'", other, pattern);
                    None
                }
            })
            .collect();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, t)| (p.as_str(), t.as_str()))
    }
}

/// Tag of a leaf: the first table entry whose pattern occurs in `name`,
/// otherwise `default_tag`.
pub fn resolve_leaf_tag(name: &str, table: &TagTable, default_tag: &str) -> String {
    table
        .iter()
        .find(|(pattern, _)| name.contains(pattern))
        .map(|(_, tag)| tag.to_string())
        .unwrap_or_else(|| default_tag.to_string())
}

/// Tag of an internal node: the children's tag when they all agree, else empty.
pub fn resolve_internal_tag<'a, I>(child_tags: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut tags = child_tags.into_iter();
    let Some(first) = tags.next() else {
        return String::new();
    };
    if tags.all(|t| t == first) {
        first.to_string()
    } else {
        String::new()
    }
}

/// Per-branch record kept in the summary: the lineage tag plus data folded in
/// by later handlers.
///
/// Also reads the positional `[tag, has_children, length, meme, meme_full]`
/// rows of older summaries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredNodeTag")]
pub struct NodeTag {
    pub tag: String,
    #[serde(rename = "leaf")]
    pub is_leaf: bool,
    #[serde(rename = "length", default, skip_serializing_if = "Option::is_none")]
    pub branch_length: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meme: Option<Vec<u64>>,
    #[serde(rename = "meme-full", default, skip_serializing_if = "Option::is_none")]
    pub meme_full: Option<Vec<u64>>,
}

#[derive(Deserialize)]
struct NodeTagFields {
    tag: String,
    #[serde(rename = "leaf")]
    is_leaf: bool,
    #[serde(rename = "length", default)]
    branch_length: Option<f64>,
    #[serde(default)]
    meme: Option<Vec<u64>>,
    #[serde(rename = "meme-full", default)]
    meme_full: Option<Vec<u64>>,
}

/// Arrays must be tried first: a derived struct would also accept one
/// field by field.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredNodeTag {
    Positional(Vec<Value>),
    Fields(NodeTagFields),
}

fn site_list(value: Option<&Value>) -> Result<Option<Vec<u64>>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(sites)) => sites
            .iter()
            .map(|site| site.as_u64().ok_or_else(|| format!("site {} is not a coordinate", site)))
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(other) => Err(format!("expected a site list, found {}", other)),
    }
}

impl TryFrom<StoredNodeTag> for NodeTag {
    type Error = String;

    fn try_from(stored: StoredNodeTag) -> Result<Self, Self::Error> {
        match stored {
            StoredNodeTag::Fields(f) => Ok(NodeTag {
                tag: f.tag,
                is_leaf: f.is_leaf,
                branch_length: f.branch_length,
                meme: f.meme,
                meme_full: f.meme_full,
            }),
            StoredNodeTag::Positional(row) => {
                let tag = row.first().and_then(Value::as_str).ok_or("tag row has no tag name")?;
                let has_children = row.get(1).and_then(Value::as_bool).ok_or("tag row has no child flag")?;
                Ok(NodeTag {
                    tag: tag.to_string(),
                    is_leaf: !has_children,
                    branch_length: row.get(2).and_then(Value::as_f64),
                    meme: site_list(row.get(3))?,
                    meme_full: site_list(row.get(4))?,
                })
            }
        }
    }
}

impl NodeTag {
    pub fn new(tag: impl Into<String>, is_leaf: bool) -> Self {
        Self {
            tag: tag.into(),
            is_leaf,
            ..Default::default()
        }
    }
}

pub type NodeTags = BTreeMap<String, NodeTag>;

/// Assigns lineage tags while a tree is being parsed.
///
/// Leaves are looked up in the [TagTable]; when per-branch attributes are
/// supplied, a leaf's `original name` attribute is matched instead of the
/// (possibly sanitised) name found in the tree text.
#[derive(Debug, Clone)]
pub struct TagPropagator<'a> {
    table: &'a TagTable,
    default_tag: &'a str,
    branch_attributes: Option<&'a Map<String, Value>>,
}

impl<'a> TagPropagator<'a> {
    pub fn new(table: &'a TagTable, default_tag: &'a str) -> Self {
        Self {
            table,
            default_tag,
            branch_attributes: None,
        }
    }

    pub fn with_branch_attributes(mut self, attributes: &'a Map<String, Value>) -> Self {
        self.branch_attributes = Some(attributes);
        self
    }

    /// Name matched against the table, or `None` when the branch attributes
    /// do not know this leaf.
    fn lookup_name<'n>(&self, name: &'n str) -> Option<&'n str>
    where
        'a: 'n,
    {
        match self.branch_attributes {
            None => Some(name),
            Some(attributes) => {
                let entry = attributes.get(name)?;
                match entry.get("original name").and_then(Value::as_str) {
                    Some(original) => Some(original),
                    None => Some(name),
                }
            }
        }
    }

    pub fn leaf_tag(&self, name: &str) -> String {
        match self.lookup_name(name) {
            Some(lookup) => resolve_leaf_tag(lookup, self.table, self.default_tag),
            None => {
                tracing::warn!("Leaf '{}' has no branch attributes; leaving it untagged", name);
                String::new()
            }
        }
    }
}

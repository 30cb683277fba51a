//! Object-path addressing into a JSON value tree.
//!
//! A path is a dot-delimited string (`"values.foo.0"`) or a sequence of
//! segments. Numeric segments address array elements when the container is
//! an array and are used as plain keys when it is an object. Writing through
//! a path creates the intermediate containers it needs: an array when the
//! next segment is numeric, an object otherwise.
//!
//! Arrays only grow by padding with nulls up to [`MAX_ARRAY_GAP`] slots past
//! their end. A write further out turns the array into an object keyed by
//! index, so the memory used never depends on the digits in a path.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Most null slots a single write may pad onto the end of an array.
pub const MAX_ARRAY_GAP: usize = 1024;

/// A single step of an [`ObjectPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// An object member name.
    Key(String),
    /// An array index (also usable as an object key).
    Index(usize),
}

impl Segment {
    /// Returns the segment as an object key.
    pub fn as_key(&self) -> String {
        match self {
            Self::Key(key) => key.clone(),
            Self::Index(index) => index.to_string(),
        }
    }

    fn empty_container(&self) -> Value {
        match self {
            Self::Index(index) if *index <= MAX_ARRAY_GAP => Value::Array(Vec::new()),
            _ => Value::Object(Map::new()),
        }
    }
}

/// Whether writing at `index` keeps an array of `len` items within bounds.
fn reachable(len: usize, index: usize) -> bool {
    index.saturating_sub(len) <= MAX_ARRAY_GAP
}

impl From<&str> for Segment {
    /// Only canonical decimal numbers (`"0"`, `"42"`, not `"007"` or `"+1"`)
    /// become indexes, so a key always survives the trip through
    /// [`Segment::as_key`] unchanged.
    fn from(raw: &str) -> Self {
        match raw.parse::<usize>() {
            Ok(index) if index.to_string() == raw => Self::Index(index),
            _ => Self::Key(raw.to_string()),
        }
    }
}

impl From<usize> for Segment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

/// A parsed location inside a nested value tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ObjectPath(Vec<Segment>);

impl ObjectPath {
    /// Parses a dot-delimited path. Empty segments are ignored.
    pub fn parse(raw: &str) -> Self {
        Self(
            raw.split('.')
                .filter(|part| !part.is_empty())
                .map(Segment::from)
                .collect(),
        )
    }

    /// The empty path, addressing the whole tree.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Returns the segments of this path.
    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this is the empty (whole tree) path.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The first segment rendered as a key, if any.
    pub fn root_key(&self) -> Option<String> {
        self.0.first().map(Segment::as_key)
    }

    /// The path without its first segment.
    pub fn tail(&self) -> ObjectPath {
        Self(self.0.iter().skip(1).cloned().collect())
    }

    /// Whether `prefix` addresses this path or one of its ancestors.
    pub fn starts_with(&self, prefix: &ObjectPath) -> bool {
        prefix.0.len() <= self.0.len()
            && prefix
                .0
                .iter()
                .zip(self.0.iter())
                .all(|(a, b)| a.as_key() == b.as_key())
    }

    /// Whether the two paths lie on the same branch: one is an ancestor of,
    /// a descendant of, or equal to the other.
    pub fn overlaps(&self, other: &ObjectPath) -> bool {
        self.starts_with(other) || other.starts_with(self)
    }

    /// Reads the value at this path.
    pub fn get<'a>(&self, tree: &'a Value) -> Option<&'a Value> {
        self.0
            .iter()
            .try_fold(tree, |node, segment| child_of(node, segment))
    }

    /// Reads the value at this path mutably.
    pub fn get_mut<'a>(&self, tree: &'a mut Value) -> Option<&'a mut Value> {
        let mut node = tree;
        for segment in &self.0 {
            node = child_of_mut(node, segment)?;
        }
        Some(node)
    }

    /// Writes `value` at this path, creating intermediate containers.
    ///
    /// A scalar found where a container is needed is replaced. Writing the
    /// empty path replaces the whole tree.
    pub fn set(&self, tree: &mut Value, value: Value) {
        let Some((last, parents)) = self.0.split_last() else {
            *tree = value;
            return;
        };

        let mut node = tree;
        for (i, segment) in parents.iter().enumerate() {
            let next = parents.get(i + 1).unwrap_or(last);
            node = ensure_child(node, segment, next);
        }

        ensure_container(node, last);
        match (node, last) {
            (Value::Array(items), Segment::Index(index)) => {
                *slot(items, *index) = value;
            }
            (Value::Object(map), segment) => {
                map.insert(segment.as_key(), value);
            }
            _ => {}
        }
    }

    /// Removes and returns the value at this path.
    ///
    /// Array elements are removed in place, shifting later elements down.
    pub fn remove(&self, tree: &mut Value) -> Option<Value> {
        let (last, parents) = self.0.split_last()?;
        let parent = ObjectPath(parents.to_vec()).get_mut(tree)?;
        match (parent, last) {
            (Value::Array(items), Segment::Index(index)) if *index < items.len() => {
                Some(items.remove(*index))
            }
            (Value::Object(map), segment) => map.remove(&segment.as_key()),
            _ => None,
        }
    }
}

fn child_of<'a>(node: &'a Value, segment: &Segment) -> Option<&'a Value> {
    match (node, segment) {
        (Value::Array(items), Segment::Index(index)) => items.get(*index),
        (Value::Object(map), segment) => map.get(&segment.as_key()),
        _ => None,
    }
}

fn child_of_mut<'a>(node: &'a mut Value, segment: &Segment) -> Option<&'a mut Value> {
    match (node, segment) {
        (Value::Array(items), Segment::Index(index)) => items.get_mut(*index),
        (Value::Object(map), segment) => map.get_mut(&segment.as_key()),
        _ => None,
    }
}

/// Returns the array slot at `index`, padding with nulls. The caller has
/// checked [`reachable`].
fn slot(items: &mut Vec<Value>, index: usize) -> &mut Value {
    if index >= items.len() {
        items.resize_with(index.saturating_add(1), || Value::Null);
    }
    &mut items[index]
}

/// Makes sure `node` can hold `segment`.
///
/// Scalars are replaced with a fresh container. An array that cannot reach
/// the index becomes an object keyed by the existing indexes.
fn ensure_container(node: &mut Value, segment: &Segment) {
    let fits = match (&*node, segment) {
        (Value::Object(_), _) => true,
        (Value::Array(items), Segment::Index(index)) => reachable(items.len(), *index),
        _ => false,
    };
    if fits {
        return;
    }
    *node = match node.take() {
        Value::Array(items) if !items.is_empty() => Value::Object(
            items
                .into_iter()
                .enumerate()
                .map(|(i, item)| (i.to_string(), item))
                .collect(),
        ),
        _ => segment.empty_container(),
    };
}

fn ensure_child<'a>(node: &'a mut Value, segment: &Segment, next: &Segment) -> &'a mut Value {
    ensure_container(node, segment);
    let child = match (node, segment) {
        (Value::Array(items), Segment::Index(index)) => slot(items, *index),
        (Value::Object(map), segment) => map
            .entry(segment.as_key())
            .or_insert_with(|| next.empty_container()),
        // ensure_container guarantees one of the arms above
        (other, _) => other,
    };
    ensure_container(child, next);
    child
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl From<&str> for ObjectPath {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<String> for ObjectPath {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<&String> for ObjectPath {
    fn from(raw: &String) -> Self {
        Self::parse(raw)
    }
}

impl From<&ObjectPath> for ObjectPath {
    fn from(path: &ObjectPath) -> Self {
        path.clone()
    }
}

impl From<Vec<Segment>> for ObjectPath {
    fn from(segments: Vec<Segment>) -> Self {
        Self(segments)
    }
}

impl From<&[&str]> for ObjectPath {
    fn from(parts: &[&str]) -> Self {
        Self(parts.iter().map(|part| Segment::from(*part)).collect())
    }
}

impl<const N: usize> From<[&str; N]> for ObjectPath {
    fn from(parts: [&str; N]) -> Self {
        Self(parts.iter().map(|part| Segment::from(*part)).collect())
    }
}

impl From<Vec<String>> for ObjectPath {
    fn from(parts: Vec<String>) -> Self {
        Self(parts.iter().map(|part| Segment::from(part.as_str())).collect())
    }
}

impl Serialize for ObjectPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ObjectPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

//! Property values carried by resource nodes

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A reference to an output attribute of another node
///
/// The attribute only exists once the referenced node has been realized by
/// the provisioning backend, so every reference implies an ordering edge.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Reference {
    /// Id of the referenced node
    #[serde(rename = "ref")]
    pub node: String,
    /// Output attribute name (e.g. "domainName", "functionArn")
    pub attribute: String,
}

impl Reference {
    pub fn new(node: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            attribute: attribute.into(),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${{{}.{}}}", self.node, self.attribute)
    }
}

/// A property value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Integer(i64),
    String(String),
    List(Vec<Value>),
    Ref(Reference),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Create a reference value
    pub fn reference(node: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::Ref(Reference::new(node, attribute))
    }

    /// Create a map value from key/value pairs
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Create a list value
    pub fn list<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Collect every reference contained in this value, depth-first
    pub fn references(&self) -> Vec<&Reference> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a Reference>) {
        match self {
            Self::Ref(r) => out.push(r),
            Self::List(items) => items.iter().for_each(|v| v.collect_references(out)),
            Self::Map(entries) => entries.values().for_each(|v| v.collect_references(out)),
            Self::Bool(_) | Self::Integer(_) | Self::String(_) => {}
        }
    }

    /// Replace every reference with the string produced by `lookup`
    ///
    /// Returns the first reference that `lookup` could not satisfy.
    pub fn substitute<F>(&self, lookup: &F) -> Result<Value, Reference>
    where
        F: Fn(&Reference) -> Option<String>,
    {
        Ok(match self {
            Self::Ref(r) => Self::String(lookup(r).ok_or_else(|| r.clone())?),
            Self::List(items) => Self::List(
                items
                    .iter()
                    .map(|v| v.substitute(lookup))
                    .collect::<Result<_, _>>()?,
            ),
            Self::Map(entries) => Self::Map(
                entries
                    .iter()
                    .map(|(k, v)| v.substitute(lookup).map(|v| (k.clone(), v)))
                    .collect::<Result<_, _>>()?,
            ),
            other => other.clone(),
        })
    }

    /// Rewrite every string through `f`, leaving references untouched
    pub fn map_strings<F>(&self, f: &F) -> Value
    where
        F: Fn(&str) -> String,
    {
        match self {
            Self::String(s) => Self::String(f(s)),
            Self::List(items) => Self::List(items.iter().map(|v| v.map_strings(f)).collect()),
            Self::Map(entries) => Self::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.map_strings(f)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Integer(i) => write!(f, "{}", i),
            Self::String(s) => write!(f, "{:?}", s),
            Self::Ref(r) => write!(f, "{}", r),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Self::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<Reference> for Value {
    fn from(r: Reference) -> Self {
        Self::Ref(r)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

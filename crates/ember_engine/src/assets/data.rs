//! Generic structured data tree
//!
//! Scene files and component fields are read into a [`DataNode`] first and
//! then picked apart with typed accessors. A field of the wrong type fails
//! only that field; the caller decides whether to skip it or give up.

use crate::foundation::math::Vec3;
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Errors produced while reading structured data
#[derive(Error, Debug)]
pub enum DataError {
    /// Required field is absent
    #[error("Missing field '{0}'")]
    Missing(String),

    /// Field exists but holds another type
    #[error("Field '{key}' should be {expected}")]
    WrongType {
        /// Field name
        key: String,
        /// Human readable expected type
        expected: &'static str,
    },

    /// Text could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// File could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File extension is not a known data format
    #[error("Unsupported data format: {0}")]
    UnsupportedFormat(String),
}

/// Loosely typed value tree
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DataNode {
    /// Absent or unit value
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Floating point number
    Float(f64),
    /// Text
    String(String),
    /// Ordered list
    Array(Vec<DataNode>),
    /// String keyed map
    Map(BTreeMap<String, DataNode>),
}

impl DataNode {
    /// Parse RON text
    pub fn from_ron_str(text: &str) -> Result<Self, DataError> {
        ron::from_str(text).map_err(|e| DataError::Parse(e.to_string()))
    }

    /// Parse TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, DataError> {
        toml::from_str(text).map_err(|e| DataError::Parse(e.to_string()))
    }

    /// Read a `.ron` or `.toml` file
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("ron") => Self::from_ron_str(&text),
            Some("toml") => Self::from_toml_str(&text),
            _ => Err(DataError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Value under `key` when this node is a map
    pub fn get(&self, key: &str) -> Option<&Self> {
        match self {
            Self::Map(map) => map.get(key),
            _ => None,
        }
    }

    /// Whether this is `Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Boolean value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Integer value
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Numeric value; integers widen
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            Self::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    /// Text value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    /// List value
    pub fn as_array(&self) -> Option<&[Self]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Map value
    pub fn as_map(&self) -> Option<&BTreeMap<String, Self>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Required typed field
    pub fn field<T: FromData>(&self, key: &str) -> Result<T, DataError> {
        self.field_opt(key)?
            .ok_or_else(|| DataError::Missing(key.to_string()))
    }

    /// Optional typed field; absent or null yields `None`, a wrong type is an error
    pub fn field_opt<T: FromData>(&self, key: &str) -> Result<Option<T>, DataError> {
        match self.get(key) {
            None | Some(Self::Null) => Ok(None),
            Some(value) => T::from_data(value)
                .map(Some)
                .ok_or_else(|| DataError::WrongType {
                    key: key.to_string(),
                    expected: T::EXPECTED,
                }),
        }
    }

    /// Typed field falling back to `default` when absent
    pub fn field_or<T: FromData>(&self, key: &str, default: T) -> Result<T, DataError> {
        Ok(self.field_opt(key)?.unwrap_or(default))
    }

    /// List field; absent yields an empty slice
    pub fn list(&self, key: &str) -> Result<&[Self], DataError> {
        match self.get(key) {
            None | Some(Self::Null) => Ok(&[]),
            Some(Self::Array(items)) => Ok(items),
            Some(_) => Err(DataError::WrongType {
                key: key.to_string(),
                expected: "a list",
            }),
        }
    }
}

impl From<BTreeMap<String, DataNode>> for DataNode {
    fn from(map: BTreeMap<String, DataNode>) -> Self {
        Self::Map(map)
    }
}

/// Conversion from a [`DataNode`] used by the typed field accessors
pub trait FromData: Sized {
    /// Description used in type errors
    const EXPECTED: &'static str;

    /// Convert, or `None` on a type mismatch
    fn from_data(node: &DataNode) -> Option<Self>;
}

impl FromData for bool {
    const EXPECTED: &'static str = "a boolean";

    fn from_data(node: &DataNode) -> Option<Self> {
        node.as_bool()
    }
}

impl FromData for i64 {
    const EXPECTED: &'static str = "an integer";

    fn from_data(node: &DataNode) -> Option<Self> {
        node.as_i64()
    }
}

impl FromData for u32 {
    const EXPECTED: &'static str = "a non-negative integer";

    fn from_data(node: &DataNode) -> Option<Self> {
        node.as_i64().and_then(|v| u32::try_from(v).ok())
    }
}

impl FromData for f32 {
    const EXPECTED: &'static str = "a number";

    fn from_data(node: &DataNode) -> Option<Self> {
        node.as_f64().map(|v| v as f32)
    }
}

impl FromData for String {
    const EXPECTED: &'static str = "a string";

    fn from_data(node: &DataNode) -> Option<Self> {
        node.as_str().map(str::to_string)
    }
}

impl<const N: usize> FromData for [f32; N] {
    const EXPECTED: &'static str = "a list of numbers";

    fn from_data(node: &DataNode) -> Option<Self> {
        let items = node.as_array()?;
        if items.len() != N {
            return None;
        }
        let mut out = [0.0; N];
        for (slot, item) in out.iter_mut().zip(items) {
            *slot = item.as_f64()? as f32;
        }
        Some(out)
    }
}

impl FromData for Vec3 {
    const EXPECTED: &'static str = "a list of 3 numbers";

    fn from_data(node: &DataNode) -> Option<Self> {
        <[f32; 3]>::from_data(node).map(Vec3::from)
    }
}

struct DataNodeVisitor;

impl<'de> Visitor<'de> for DataNodeVisitor {
    type Value = DataNode;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any structured value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<DataNode, E> {
        Ok(DataNode::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<DataNode, E> {
        Ok(DataNode::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<DataNode, E> {
        Ok(i64::try_from(v).map_or(DataNode::Float(v as f64), DataNode::Int))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<DataNode, E> {
        Ok(DataNode::Float(v))
    }

    fn visit_char<E: de::Error>(self, v: char) -> Result<DataNode, E> {
        Ok(DataNode::String(v.to_string()))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<DataNode, E> {
        Ok(DataNode::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<DataNode, E> {
        Ok(DataNode::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<DataNode, E> {
        Ok(DataNode::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<DataNode, E> {
        Ok(DataNode::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<DataNode, D::Error> {
        DataNode::deserialize(deserializer)
    }

    fn visit_newtype_struct<D: Deserializer<'de>>(
        self,
        deserializer: D,
    ) -> Result<DataNode, D::Error> {
        DataNode::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<DataNode, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(DataNode::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<DataNode, A::Error> {
        let mut map = BTreeMap::new();
        while let Some((key, value)) = access.next_entry::<String, DataNode>()? {
            map.insert(key, value);
        }
        Ok(DataNode::Map(map))
    }
}

impl<'de> Deserialize<'de> for DataNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(DataNodeVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENE: &str = r#"
        (
            name: "root",
            position: (1.0, 2, 3.5),
            scale: 2,
            components: [
                (type: "mesh", mesh: "mesh:cube"),
            ],
            children: [
                { "scene": "scenes/other.ron" },
            ],
        )
    "#;

    #[test]
    fn test_ron_tree() {
        let node = DataNode::from_ron_str(SCENE).unwrap();
        assert_eq!(node.field::<String>("name").unwrap(), "root");
        assert_eq!(node.field::<Vec3>("position").unwrap(), Vec3::new(1.0, 2.0, 3.5));
        assert_eq!(node.field::<f32>("scale").unwrap(), 2.0);

        let components = node.list("components").unwrap();
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].field::<String>("type").unwrap(), "mesh");

        let children = node.list("children").unwrap();
        assert_eq!(children[0].field::<String>("scene").unwrap(), "scenes/other.ron");
    }

    #[test]
    fn test_toml_tree() {
        let node = DataNode::from_toml_str(
            r#"
            name = "light"
            intensity = 4.5
            enabled = true
            "#,
        )
        .unwrap();
        assert_eq!(node.field::<String>("name").unwrap(), "light");
        assert_eq!(node.field::<f32>("intensity").unwrap(), 4.5);
        assert!(node.field::<bool>("enabled").unwrap());
    }

    #[test]
    fn test_accessors_fail_per_field() {
        let node = DataNode::from_ron_str(r#"(name: 3, scale: 1.5)"#).unwrap();

        assert!(matches!(
            node.field::<String>("name"),
            Err(DataError::WrongType { expected: "a string", .. })
        ));
        // A bad neighbour does not affect other fields.
        assert_eq!(node.field::<f32>("scale").unwrap(), 1.5);
        assert!(matches!(node.field::<f32>("missing"), Err(DataError::Missing(_))));
        assert_eq!(node.field_or("missing", 7.0_f32).unwrap(), 7.0);
        assert_eq!(node.field_opt::<bool>("missing").unwrap(), None);
    }

    #[test]
    fn test_vec3_needs_three_numbers() {
        let node = DataNode::from_ron_str(r#"(position: (1.0, 2.0))"#).unwrap();
        assert!(node.field::<Vec3>("position").is_err());
    }

    #[test]
    fn test_list_on_absent_is_empty() {
        let node = DataNode::from_ron_str(r#"(name: "x")"#).unwrap();
        assert!(node.list("children").unwrap().is_empty());
        assert!(node.list("name").is_err());
    }
}

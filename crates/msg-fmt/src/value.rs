use std::collections::BTreeMap;

/// A structured value carried in a NOTE payload.
///
/// Maps keep their keys sorted, which is what makes the encoding canonical.
/// Strings inside maps that look like even-length hex go over the wire as raw
/// bytes and come back as lowercase hex.
#[derive(Debug, Clone, PartialEq)]
pub enum NoteValue {
    /// Nil.
    Nil,
    /// Boolean.
    Bool(bool),
    /// Integer. Values above the signed 64-bit range use the wide marker.
    Int(i128),
    /// Double precision float.
    Float(f64),
    /// Text, or hex text standing for bytes.
    Str(String),
    /// Ordered list.
    Array(Vec<NoteValue>),
    /// String-keyed map.
    Map(BTreeMap<String, NoteValue>),
}

impl NoteValue {
    /// Builds a map from key/value pairs.
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<NoteValue>,
    {
        NoteValue::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Looks up a field of a map value.
    pub fn get(&self, key: &str) -> Option<&NoteValue> {
        match self {
            NoteValue::Map(m) => m.get(key),
            _ => None,
        }
    }

    /// Returns the string, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            NoteValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer, if this is one.
    pub fn as_int(&self) -> Option<i128> {
        match self {
            NoteValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the map, if this is one.
    pub fn as_map(&self) -> Option<&BTreeMap<String, NoteValue>> {
        match self {
            NoteValue::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl From<bool> for NoteValue {
    fn from(v: bool) -> Self {
        NoteValue::Bool(v)
    }
}

macro_rules! impl_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for NoteValue {
                fn from(v: $ty) -> Self {
                    NoteValue::Int(i128::from(v))
                }
            }
        )*
    };
}

impl_from_int!(u8, u16, u32, u64, i8, i16, i32, i64, i128);

impl From<f64> for NoteValue {
    fn from(v: f64) -> Self {
        NoteValue::Float(v)
    }
}

impl From<&str> for NoteValue {
    fn from(v: &str) -> Self {
        NoteValue::Str(v.to_owned())
    }
}

impl From<String> for NoteValue {
    fn from(v: String) -> Self {
        NoteValue::Str(v)
    }
}

impl<T: Into<NoteValue>> From<Vec<T>> for NoteValue {
    fn from(v: Vec<T>) -> Self {
        NoteValue::Array(v.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, NoteValue>> for NoteValue {
    fn from(v: BTreeMap<String, NoteValue>) -> Self {
        NoteValue::Map(v)
    }
}

impl From<serde_json::Value> for NoteValue {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => NoteValue::Nil,
            serde_json::Value::Bool(b) => NoteValue::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    NoteValue::Int(i128::from(i))
                } else if let Some(u) = n.as_u64() {
                    NoteValue::Int(i128::from(u))
                } else {
                    NoteValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => NoteValue::Str(s),
            serde_json::Value::Array(items) => {
                NoteValue::Array(items.into_iter().map(NoteValue::from).collect())
            }
            serde_json::Value::Object(obj) => NoteValue::Map(
                obj.into_iter()
                    .map(|(k, v)| (k, NoteValue::from(v)))
                    .collect(),
            ),
        }
    }
}

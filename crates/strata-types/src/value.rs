use serde::{Deserialize, Serialize};

/// Type tag for a stored property value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Boolean scalar.
    Bool,
    /// 64-bit signed integer scalar.
    Int64,
    /// 64-bit floating point scalar.
    Float64,
    /// Single UTF-8 string.
    String,
    /// Fixed-length vector of 64-bit floats.
    FloatVec,
    /// Variable-length array of UTF-8 strings.
    StringVec,
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::Int64 => write!(f, "int64"),
            Self::Float64 => write!(f, "float64"),
            Self::String => write!(f, "string"),
            Self::FloatVec => write!(f, "float-vec"),
            Self::StringVec => write!(f, "string-vec"),
        }
    }
}

/// A typed property value as held in memory.
///
/// `Value` is what the entity layer reads and writes; each backend bridges
/// it onto its own native representation (fixed-width buffers plus a
/// variable-length heap in the container, a tagged JSON document on the
/// filesystem). The serde form of this enum IS the filesystem document
/// representation, so renaming variants is a format break.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    FloatVec(Vec<f64>),
    StrVec(Vec<String>),
}

impl Value {
    /// The type tag of this value.
    pub fn dtype(&self) -> DataType {
        match self {
            Self::Bool(_) => DataType::Bool,
            Self::Int(_) => DataType::Int64,
            Self::Float(_) => DataType::Float64,
            Self::Str(_) => DataType::String,
            Self::FloatVec(_) => DataType::FloatVec,
            Self::StrVec(_) => DataType::StringVec,
        }
    }

    /// Element count: 1 for scalars, the vector length otherwise.
    pub fn len(&self) -> usize {
        match self {
            Self::Bool(_) | Self::Int(_) | Self::Float(_) | Self::Str(_) => 1,
            Self::FloatVec(v) => v.len(),
            Self::StrVec(v) => v.len(),
        }
    }

    /// Returns `true` for an empty vector value.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` for scalar (non-vector) values.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Self::Bool(_) | Self::Int(_) | Self::Float(_) | Self::Str(_)
        )
    }

    /// Borrow as a float vector, if this is one.
    pub fn as_float_vec(&self) -> Option<&[f64]> {
        match self {
            Self::FloatVec(v) => Some(v),
            _ => None,
        }
    }

    /// Borrow as a string array, if this is one.
    pub fn as_str_vec(&self) -> Option<&[String]> {
        match self {
            Self::StrVec(v) => Some(v),
            _ => None,
        }
    }

    /// Borrow as a single string, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// As an integer scalar, if this is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Self::FloatVec(v)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Self::StrVec(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dtype_matches_variant() {
        assert_eq!(Value::Bool(true).dtype(), DataType::Bool);
        assert_eq!(Value::Int(1).dtype(), DataType::Int64);
        assert_eq!(Value::Float(1.5).dtype(), DataType::Float64);
        assert_eq!(Value::from("x").dtype(), DataType::String);
        assert_eq!(Value::FloatVec(vec![1.0]).dtype(), DataType::FloatVec);
        assert_eq!(
            Value::StrVec(vec!["mV".into()]).dtype(),
            DataType::StringVec
        );
    }

    #[test]
    fn len_scalars_are_one() {
        assert_eq!(Value::Bool(false).len(), 1);
        assert_eq!(Value::Int(7).len(), 1);
        assert_eq!(Value::from("hello").len(), 1);
    }

    #[test]
    fn len_vectors_count_elements() {
        assert_eq!(Value::FloatVec(vec![1.0, 2.0, 3.0]).len(), 3);
        assert_eq!(Value::StrVec(vec![]).len(), 0);
        assert!(Value::StrVec(vec![]).is_empty());
    }

    #[test]
    fn scalar_predicate() {
        assert!(Value::Float(0.5).is_scalar());
        assert!(!Value::FloatVec(vec![0.5]).is_scalar());
    }

    #[test]
    fn accessors() {
        let v = Value::FloatVec(vec![1.0, 2.0]);
        assert_eq!(v.as_float_vec(), Some(&[1.0, 2.0][..]));
        assert!(v.as_str_vec().is_none());

        let s = Value::from("label");
        assert_eq!(s.as_str(), Some("label"));
        assert!(s.as_int().is_none());

        assert_eq!(Value::Int(12).as_int(), Some(12));
    }

    #[test]
    fn from_impls() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(3i64), Value::Int(3));
        assert_eq!(Value::from(2.5f64), Value::Float(2.5));
        assert_eq!(Value::from("s".to_string()), Value::Str("s".into()));
        assert_eq!(Value::from(vec![1.0]), Value::FloatVec(vec![1.0]));
        assert_eq!(
            Value::from(vec!["a".to_string()]),
            Value::StrVec(vec!["a".into()])
        );
    }

    #[test]
    fn serde_roundtrip_all_variants() {
        let values = vec![
            Value::Bool(true),
            Value::Int(-42),
            Value::Float(3.25),
            Value::from("text"),
            Value::FloatVec(vec![1.0, 2.0, 0.5]),
            Value::StrVec(vec!["mV".into(), "ms".into()]),
        ];
        for v in values {
            let json = serde_json::to_string(&v).unwrap();
            let parsed: Value = serde_json::from_str(&json).unwrap();
            assert_eq!(v, parsed);
        }
    }

    #[test]
    fn dtype_display() {
        assert_eq!(format!("{}", DataType::Float64), "float64");
        assert_eq!(format!("{}", DataType::StringVec), "string-vec");
    }
}

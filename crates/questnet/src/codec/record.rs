use std::collections::BTreeMap;

/// A field value as the codec sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Uint(u64),
    Str(String),
    Bool(bool),
    Ints(Vec<u64>),
    List(Vec<Record>),
    Map(BTreeMap<u64, Record>),
    Object(Record),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Uint(_) => "integer",
            Value::Str(_) => "string",
            Value::Bool(_) => "boolean",
            Value::Ints(_) => "integer array",
            Value::List(_) => "object array",
            Value::Map(_) => "map",
            Value::Object(_) => "object",
        }
    }
}

macro_rules! uint_value {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::Uint(u64::from(value))
                }
            }
        )*
    };
}

uint_value!(u8, u16, u32, u64);

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_owned())
    }
}

impl From<Vec<u64>> for Value {
    fn from(value: Vec<u64>) -> Self {
        Value::Ints(value)
    }
}

impl From<Vec<Record>> for Value {
    fn from(value: Vec<Record>) -> Self {
        Value::List(value)
    }
}

impl From<BTreeMap<u64, Record>> for Value {
    fn from(value: BTreeMap<u64, Record>) -> Self {
        Value::Map(value)
    }
}

impl From<Record> for Value {
    fn from(value: Record) -> Self {
        Value::Object(value)
    }
}

/// An object to encode, or the result of a decode. Only fields that are
/// present are stored; absence is what the presence mask reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: BTreeMap<&'static str, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &'static str, value: impl Into<Value>) -> Self {
        self.fields.insert(key, value.into());
        self
    }

    pub fn with_opt<V: Into<Value>>(mut self, key: &'static str, value: Option<V>) -> Self {
        if let Some(value) = value {
            self.fields.insert(key, value.into());
        }
        self
    }

    pub fn insert(&mut self, key: &'static str, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(key, value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.keys().copied()
    }

    pub fn uint(&self, key: &str) -> Option<u64> {
        match self.fields.get(key) {
            Some(Value::Uint(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn boolean(&self, key: &str) -> Option<bool> {
        match self.fields.get(key) {
            Some(Value::Bool(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        match self.fields.get(key) {
            Some(Value::Str(value)) => Some(value),
            _ => None,
        }
    }

    pub fn ints(&self, key: &str) -> Option<&[u64]> {
        match self.fields.get(key) {
            Some(Value::Ints(values)) => Some(values),
            _ => None,
        }
    }

    pub fn list(&self, key: &str) -> Option<&[Record]> {
        match self.fields.get(key) {
            Some(Value::List(records)) => Some(records),
            _ => None,
        }
    }

    pub fn map(&self, key: &str) -> Option<&BTreeMap<u64, Record>> {
        match self.fields.get(key) {
            Some(Value::Map(entries)) => Some(entries),
            _ => None,
        }
    }

    pub fn object(&self, key: &str) -> Option<&Record> {
        match self.fields.get(key) {
            Some(Value::Object(record)) => Some(record),
            _ => None,
        }
    }
}

/// Conversion of a typed game structure into its wire record.
pub trait ToRecord {
    fn to_record(&self) -> Record;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_opt_skips_none() {
        let record = Record::new()
            .with("id", 3u16)
            .with_opt("target", None::<u16>)
            .with_opt("x", Some(4u8));

        assert_eq!(record.len(), 2);
        assert!(!record.contains("target"));
        assert_eq!(record.uint("x"), Some(4));
    }

    #[test]
    fn typed_getters_check_kind() {
        let record = Record::new().with("name", "rat").with("alive", true);

        assert_eq!(record.str("name"), Some("rat"));
        assert_eq!(record.uint("name"), None);
        assert_eq!(record.boolean("alive"), Some(true));
        assert_eq!(record.get("alive").map(Value::kind), Some("boolean"));
    }
}

// used for Date values
use chrono::{DateTime, SecondsFormat, Utc};
// used for the value type tags in schema documents
use serde::{Deserialize, Serialize};

// used to compare numeric values of mixed width
use std::cmp::Ordering;
// used to print out readable forms of values and types
use std::fmt;
use std::sync::Arc;

use crate::model::{Model, ModelHandle};
use crate::schema::SchemaId;

// ------------- Value Type -------------
/// Classification of what a slot holds. Model and list types carry what
/// they refer to, so two slots with the same classification are
/// interchangeable when coercing text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ValueType {
    Boolean,
    Integer,
    Long,
    Double,
    Text,
    Date,
    Link,
    Choice { options: Vec<String> },
    Model { schema: SchemaId },
    List { element: Box<ValueType> },
    Native { name: String },
}

impl ValueType {
    pub fn model(schema: impl Into<SchemaId>) -> Self {
        ValueType::Model {
            schema: schema.into(),
        }
    }
    pub fn list(element: ValueType) -> Self {
        ValueType::List {
            element: Box::new(element),
        }
    }
    pub fn list_of_models(schema: impl Into<SchemaId>) -> Self {
        Self::list(Self::model(schema))
    }
    pub fn name(&self) -> &'static str {
        match self {
            ValueType::Boolean => "Boolean",
            ValueType::Integer => "Integer",
            ValueType::Long => "Long",
            ValueType::Double => "Double",
            ValueType::Text => "Text",
            ValueType::Date => "Date",
            ValueType::Link => "Link",
            ValueType::Choice { .. } => "Choice",
            ValueType::Model { .. } => "Model",
            ValueType::List { .. } => "List",
            ValueType::Native { .. } => "Native",
        }
    }
    pub fn is_integral(&self) -> bool {
        matches!(self, ValueType::Integer | ValueType::Long)
    }
    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueType::Integer | ValueType::Long | ValueType::Double)
    }
    pub fn element_type(&self) -> Option<&ValueType> {
        match self {
            ValueType::List { element } => Some(element),
            _ => None,
        }
    }
    /// The schema a model or list-of-model type refers to.
    pub fn referenced_schema(&self) -> Option<&SchemaId> {
        match self {
            ValueType::Model { schema } => Some(schema),
            ValueType::List { element } => match element.as_ref() {
                ValueType::Model { schema } => Some(schema),
                _ => None,
            },
            _ => None,
        }
    }
    pub fn is_list_of_models(&self) -> bool {
        matches!(self, ValueType::List { element } if matches!(element.as_ref(), ValueType::Model { .. }))
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ValueType::Choice { options } => write!(f, "Choice({})", options.join("|")),
            ValueType::Model { schema } => write!(f, "Model<{}>", schema),
            ValueType::List { element } => write!(f, "List<{}>", element),
            ValueType::Native { name } => write!(f, "Native<{}>", name),
            other => write!(f, "{}", other.name()),
        }
    }
}

// ------------- Value -------------
#[derive(Debug, Clone)]
pub enum Value {
    Boolean(bool),
    Integer(i32),
    Long(i64),
    Double(f64),
    Text(String),
    Date(DateTime<Utc>),
    Link(String),
    Choice(String),
    List(Vec<Value>),
    Model(ModelHandle),
    Native(serde_json::Value),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "Boolean",
            Value::Integer(_) => "Integer",
            Value::Long(_) => "Long",
            Value::Double(_) => "Double",
            Value::Text(_) => "Text",
            Value::Date(_) => "Date",
            Value::Link(_) => "Link",
            Value::Choice(_) => "Choice",
            Value::List(_) => "List",
            Value::Model(_) => "Model",
            Value::Native(_) => "Native",
        }
    }
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i as i64),
            Value::Long(l) => Some(*l),
            _ => None,
        }
    }
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Long(l) => Some(*l as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) | Value::Link(s) | Value::Choice(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_model(&self) -> Option<&ModelHandle> {
        match self {
            Value::Model(m) => Some(m),
            _ => None,
        }
    }
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
    /// Orders two numeric values. Integral pairs compare exactly, anything
    /// involving a double compares as `f64`. Non-numeric values yield `None`.
    pub fn compare_numeric(&self, other: &Value) -> Option<Ordering> {
        match (self.as_i64(), other.as_i64()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => self.as_f64()?.partial_cmp(&other.as_f64()?),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Link(a), Value::Link(b)) => a == b,
            (Value::Choice(a), Value::Choice(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            // models are compared by identity, not by content
            (Value::Model(a), Value::Model(b)) => Arc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => a == b,
            (a, b) => a.compare_numeric(b) == Some(Ordering::Equal),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Long(l) => write!(f, "{}", l),
            Value::Double(d) => write!(f, "{}", d),
            Value::Text(s) | Value::Link(s) | Value::Choice(s) => write!(f, "{}", s),
            Value::Date(d) => write!(f, "{}", d.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::List(items) => {
                let mut s = String::new();
                for item in items {
                    s += &(item.to_string() + ", ");
                }
                s.pop();
                s.pop();
                write!(f, "[{}]", s)
            }
            Value::Model(m) => match m.uri() {
                Some(uri) => write!(f, "<{}>", uri),
                None => write!(f, "<{}>", m.schema_id()),
            },
            Value::Native(json) => write!(f, "{}", json),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}
impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i)
    }
}
impl From<i64> for Value {
    fn from(l: i64) -> Self {
        Value::Long(l)
    }
}
impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}
impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}
impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}
impl From<ModelHandle> for Value {
    fn from(m: ModelHandle) -> Self {
        Value::Model(m)
    }
}

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CompileError, Result};
use crate::model::Model;
use crate::prototype::Prototype;
use crate::schema::{SchemaId, ValueSourceDeclaration};
use crate::syntax::{Syntax, coerce};
use crate::value::{Value, ValueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueSourceKind {
    /// A slot (or dot-separated slot path) read off the referrer.
    ReferrerSlot,
    /// A query parameter from the referrer's scope hints.
    QueryParameter,
    /// Literal text, coerced once when the source is built.
    Constant,
}

/// A compiled value source: where the value bound to `reference_slot_name`
/// of the reference schema comes from, relative to a referrer model.
#[derive(Debug, Clone)]
pub struct ProtoValueSource {
    reference_schema_id: SchemaId,
    reference_slot_name: String,
    reference_value_type: ValueType,
    referrer_schema_id: SchemaId,
    kind: ValueSourceKind,
    text: String,
    path: Vec<String>,
    constant: Option<Value>,
}

impl ProtoValueSource {
    pub fn new(
        reference: &Prototype,
        reference_slot_name: &str,
        referrer: &Prototype,
        declaration: &ValueSourceDeclaration,
        syntax: &dyn Syntax,
    ) -> Result<Self> {
        let reference_slot = reference
            .slot(reference_slot_name)
            .ok_or_else(|| CompileError::UnknownReferenceSlot {
                schema: reference.schema_id().clone(),
                slot: reference_slot_name.to_string(),
            })?;
        let reference_value_type = reference_slot.value_type().clone();

        let mut path = Vec::new();
        let mut constant = None;
        match declaration.kind {
            ValueSourceKind::ReferrerSlot => {
                let unknown = || CompileError::UnknownReferrerSlot {
                    schema: referrer.schema_id().clone(),
                    slot: declaration.text.clone(),
                };
                for segment in declaration.text.split('.') {
                    if segment.trim().is_empty() {
                        return Err(unknown().into());
                    }
                    path.push(segment.trim().to_string());
                }
                // only the first hop is known statically, the rest depends on live values
                let first = referrer.real_name(&path[0]).ok_or_else(unknown)?;
                path[0] = first.to_string();
            }
            ValueSourceKind::QueryParameter => (),
            ValueSourceKind::Constant => {
                constant = Some(coerce(syntax, &declaration.text, &reference_value_type)?);
            }
        }

        Ok(Self {
            reference_schema_id: reference.schema_id().clone(),
            reference_slot_name: reference_slot.name().to_string(),
            reference_value_type,
            referrer_schema_id: referrer.schema_id().clone(),
            kind: declaration.kind,
            text: declaration.text.clone(),
            path,
            constant,
        })
    }

    pub fn kind(&self) -> ValueSourceKind {
        self.kind
    }
    pub fn text(&self) -> &str {
        &self.text
    }
    pub fn reference_schema_id(&self) -> &SchemaId {
        &self.reference_schema_id
    }
    pub fn reference_slot_name(&self) -> &str {
        &self.reference_slot_name
    }
    pub fn reference_value_type(&self) -> &ValueType {
        &self.reference_value_type
    }
    pub fn referrer_schema_id(&self) -> &SchemaId {
        &self.referrer_schema_id
    }
    pub fn constant(&self) -> Option<&Value> {
        self.constant.as_ref()
    }

    /// Resolves the value against a live referrer. A missing query parameter
    /// or a broken slot path yields `Ok(None)`; a query parameter that does
    /// not coerce to the reference slot's type is an error.
    pub fn resolve(&self, syntax: &dyn Syntax, referrer: &dyn Model) -> Result<Option<Value>> {
        match self.kind {
            ValueSourceKind::Constant => Ok(self.constant.clone()),
            ValueSourceKind::QueryParameter => match referrer.hints().query_parameter(&self.text) {
                Some(raw) => Ok(Some(coerce(syntax, raw, &self.reference_value_type)?)),
                None => {
                    debug!(parameter = %self.text, "query parameter absent");
                    Ok(None)
                }
            },
            ValueSourceKind::ReferrerSlot => Ok(self.walk(referrer)),
        }
    }

    fn walk(&self, referrer: &dyn Model) -> Option<Value> {
        let mut segments = self.path.iter();
        let mut current = referrer.slot_value(segments.next()?);
        for segment in segments {
            let value = match current {
                Some(value) => value,
                None => {
                    debug!(path = %self.text, at = %segment, "referrer path interrupted by a missing value");
                    return None;
                }
            };
            current = match &value {
                Value::Model(model) => model.slot_value(segment),
                other => read_accessor(other, segment),
            };
        }
        current
    }
}

/// Reads a named member off a value that is not a model, trying the member
/// name itself and then the conventional `getName` and `isName` accessors.
fn read_accessor(value: &Value, name: &str) -> Option<Value> {
    let object = match value {
        Value::Native(serde_json::Value::Object(object)) => object,
        _ => return None,
    };
    getter_names(name)
        .iter()
        .find_map(|candidate| object.get(candidate))
        .and_then(from_json)
}

fn getter_names(name: &str) -> [String; 3] {
    let mut chars = name.chars();
    let capitalized = match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    };
    [
        name.to_string(),
        format!("get{}", capitalized),
        format!("is{}", capitalized),
    ]
}

fn from_json(json: &serde_json::Value) -> Option<Value> {
    match json {
        serde_json::Value::Null => None,
        serde_json::Value::Bool(b) => Some(Value::Boolean(*b)),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(l) => Some(Value::Long(l)),
            None => n.as_f64().map(Value::Double),
        },
        serde_json::Value::String(s) => Some(Value::Text(s.clone())),
        other => Some(Value::Native(other.clone())),
    }
}

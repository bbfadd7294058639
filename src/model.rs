use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Result, ValidationError};
use crate::prototype::Prototype;
use crate::schema::SchemaId;
use crate::value::Value;

// ------------- Scope Hints -------------
/// Request-scoped hints that travel with a model: which slots to include or
/// exclude, which links to embed, the raw query parameters, the locale and
/// the URI of whoever referred to the model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScopeHints {
    pub included_slot_names: Vec<String>,
    pub excluded_slot_names: Vec<String>,
    pub embedded_link_slot_names: Vec<String>,
    pub query_parameters: BTreeMap<String, String>,
    pub locale: Option<String>,
    pub referrer_uri: Option<String>,
}

impl ScopeHints {
    /// Hints for the documents held by `slot_name`: only the entries that
    /// start with `"{slot_name}."` survive, re-keyed without the prefix.
    /// Locale and referrer URI are carried over unchanged.
    pub fn nested(&self, slot_name: &str) -> ScopeHints {
        let prefix = format!("{}.", slot_name);
        let strip = |names: &[String]| -> Vec<String> {
            names
                .iter()
                .filter_map(|name| name.strip_prefix(&prefix))
                .map(str::to_string)
                .collect()
        };
        ScopeHints {
            included_slot_names: strip(&self.included_slot_names),
            excluded_slot_names: strip(&self.excluded_slot_names),
            embedded_link_slot_names: strip(&self.embedded_link_slot_names),
            query_parameters: self
                .query_parameters
                .iter()
                .filter_map(|(key, value)| {
                    key.strip_prefix(&prefix)
                        .map(|nested| (nested.to_string(), value.clone()))
                })
                .collect(),
            locale: self.locale.clone(),
            referrer_uri: self.referrer_uri.clone(),
        }
    }
    pub fn query_parameter(&self, name: &str) -> Option<&str> {
        self.query_parameters.get(name).map(String::as_str)
    }
}

// ------------- Model -------------
/// A live model instance as seen by this crate: something with a schema,
/// readable slots and the hints it was requested with.
pub trait Model: fmt::Debug + Send + Sync {
    fn schema_id(&self) -> &SchemaId;
    fn slot_value(&self, slot_name: &str) -> Option<Value>;
    fn hints(&self) -> &ScopeHints;
    fn uri(&self) -> Option<&str> {
        None
    }
}

pub type ModelHandle = Arc<dyn Model>;

/// In-memory model backed by a slot map.
#[derive(Debug, Clone)]
pub struct DynamicModel {
    schema_id: SchemaId,
    uri: Option<String>,
    slots: BTreeMap<String, Value>,
    hints: ScopeHints,
}

impl DynamicModel {
    pub fn new(schema_id: impl Into<SchemaId>) -> Self {
        Self {
            schema_id: schema_id.into(),
            uri: None,
            slots: BTreeMap::new(),
            hints: ScopeHints::default(),
        }
    }
    /// A model with every property slot that declares a default already set.
    pub fn from_prototype(prototype: &Prototype) -> Self {
        let mut model = Self::new(prototype.schema_id().clone());
        for slot in prototype.property_slots() {
            if let Some(default) = slot.default_value() {
                model.slots.insert(slot.name().to_string(), default.clone());
            }
        }
        model
    }
    pub fn with_slot(mut self, slot_name: &str, value: impl Into<Value>) -> Self {
        self.slots.insert(slot_name.to_string(), value.into());
        self
    }
    pub fn with_hints(mut self, hints: ScopeHints) -> Self {
        self.hints = hints;
        self
    }
    pub fn with_uri(mut self, uri: &str) -> Self {
        self.uri = Some(uri.to_string());
        self
    }
    /// Writes a slot after the prototype has accepted the value. Aliases are
    /// stored under the real slot name.
    pub fn set_slot(&mut self, prototype: &Prototype, slot_name: &str, value: Value) -> Result<()> {
        if prototype.schema_id() != &self.schema_id {
            return Err(ValidationError::UnknownSlot {
                slot: slot_name.to_string(),
                schema: self.schema_id.clone(),
            }
            .into());
        }
        let real_name = prototype.validate_write(slot_name, &value)?;
        self.slots.insert(real_name.to_string(), value);
        Ok(())
    }
    pub fn remove_slot(&mut self, slot_name: &str) -> Option<Value> {
        self.slots.remove(slot_name)
    }
    pub fn slots(&self) -> &BTreeMap<String, Value> {
        &self.slots
    }
    pub fn into_handle(self) -> ModelHandle {
        Arc::new(self)
    }
}

impl Model for DynamicModel {
    fn schema_id(&self) -> &SchemaId {
        &self.schema_id
    }
    fn slot_value(&self, slot_name: &str) -> Option<Value> {
        self.slots.get(slot_name).cloned()
    }
    fn hints(&self) -> &ScopeHints {
        &self.hints
    }
    fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }
}

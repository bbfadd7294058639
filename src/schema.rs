//! Declarative schema documents as they come from a schema source.
//!
//! Nothing here is resolved: base schemas are identifiers, constraint bounds
//! and defaults are still text, and link or collection bindings only name the
//! slots they refer to. The [`crate::compiler::PrototypeCompiler`] turns a
//! schema and its ancestors into a [`crate::prototype::Prototype`].

use serde::{Deserialize, Serialize};

// keepers use HashMap with a fast hasher, as the keys are short identifiers
use core::hash::BuildHasherDefault;
use seahash::SeaHasher;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::error::{ProtoError, Result};
use crate::search::ComparisonOperator;
use crate::value::ValueType;
use crate::value_source::ValueSourceKind;

pub type SchemaHasher = BuildHasherDefault<SeaHasher>;

// ------------- Schema Id -------------
/// URI-like identifier of a schema, stable for the schema's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaId(String);

impl SchemaId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl From<&str> for SchemaId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}
impl From<String> for SchemaId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
impl From<&SchemaId> for SchemaId {
    fn from(id: &SchemaId) -> Self {
        id.clone()
    }
}

// ------------- Interaction Method -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Head,
    Options,
    Put,
    Post,
    Delete,
    Patch,
}

impl Method {
    /// Read-only methods; only these may back an embedded link.
    pub fn is_safe(&self) -> bool {
        matches!(self, Method::Get | Method::Head | Method::Options)
    }
    pub fn is_idempotent(&self) -> bool {
        self.is_safe() || matches!(self, Method::Put | Method::Delete)
    }
}
impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
        };
        write!(f, "{}", name)
    }
}

// ------------- Declarations -------------
/// Bounds and exclusions for a value slot, kept as text until the slot's
/// value type is known.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Constraints {
    pub minimum: Option<String>,
    pub exclusive_minimum: bool,
    pub maximum: Option<String>,
    pub exclusive_maximum: bool,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub min_size: Option<usize>,
    pub max_size: Option<usize>,
    pub divisor: Option<String>,
    pub disallowed: Vec<String>,
}

/// Where a bound value comes from, in declared (unresolved) form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueSourceDeclaration {
    pub kind: ValueSourceKind,
    pub text: String,
}

impl ValueSourceDeclaration {
    pub fn referrer_slot(path: &str) -> Self {
        Self {
            kind: ValueSourceKind::ReferrerSlot,
            text: path.to_string(),
        }
    }
    pub fn query_parameter(name: &str) -> Self {
        Self {
            kind: ValueSourceKind::QueryParameter,
            text: name.to_string(),
        }
    }
    pub fn constant(text: &str) -> Self {
        Self {
            kind: ValueSourceKind::Constant,
            text: text.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriterionDeclaration {
    pub reference_slot: String,
    pub source: ValueSourceDeclaration,
    pub operator: ComparisonOperator,
    #[serde(default)]
    pub case_insensitive: bool,
}

impl CriterionDeclaration {
    pub fn new(reference_slot: &str, operator: ComparisonOperator, source: ValueSourceDeclaration) -> Self {
        Self {
            reference_slot: reference_slot.to_string(),
            source,
            operator,
            case_insensitive: false,
        }
    }
}

/// Marks a value slot as populated by searching for referenced documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CollectionDeclaration {
    pub link_relation: Option<String>,
    pub limit: Option<u32>,
    pub and: Vec<CriterionDeclaration>,
    pub or: Vec<CriterionDeclaration>,
}

impl CollectionDeclaration {
    pub fn and(mut self, criterion: CriterionDeclaration) -> Self {
        self.and.push(criterion);
        self
    }
    pub fn or(mut self, criterion: CriterionDeclaration) -> Self {
        self.or.push(criterion);
        self
    }
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
    pub fn relation(mut self, relation: &str) -> Self {
        self.link_relation = Some(relation.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotDeclaration {
    pub name: String,
    pub value_type: ValueType,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub searchable: bool,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub constraints: Constraints,
    #[serde(default)]
    pub collection: Option<CollectionDeclaration>,
    /// Name of a link slot whose target populates this (single-valued) slot.
    #[serde(default)]
    pub link_binding: Option<String>,
}

impl SlotDeclaration {
    pub fn new(name: &str, value_type: ValueType) -> Self {
        Self {
            name: name.to_string(),
            value_type,
            title: String::new(),
            description: String::new(),
            aliases: Vec::new(),
            searchable: false,
            default: None,
            constraints: Constraints::default(),
            collection: None,
            link_binding: None,
        }
    }
    pub fn alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }
    pub fn searchable(mut self) -> Self {
        self.searchable = true;
        self
    }
    pub fn default_value(mut self, text: &str) -> Self {
        self.default = Some(text.to_string());
        self
    }
    pub fn constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }
    pub fn collection(mut self, collection: CollectionDeclaration) -> Self {
        self.collection = Some(collection);
        self
    }
    pub fn link_binding(mut self, link_slot: &str) -> Self {
        self.link_binding = Some(link_slot.to_string());
        self
    }
    pub fn title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkDeclaration {
    pub name: String,
    pub relation: String,
    pub method: Method,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub request_type: Option<ValueType>,
    #[serde(default)]
    pub response_type: Option<ValueType>,
    #[serde(default)]
    pub embedded: bool,
    /// Reference slot name (in the response schema) to the source of its value.
    #[serde(default)]
    pub bindings: BTreeMap<String, ValueSourceDeclaration>,
}

impl LinkDeclaration {
    pub fn new(name: &str, relation: &str, method: Method) -> Self {
        Self {
            name: name.to_string(),
            relation: relation.to_string(),
            method,
            title: String::new(),
            description: String::new(),
            request_type: None,
            response_type: None,
            embedded: false,
            bindings: BTreeMap::new(),
        }
    }
    pub fn request(mut self, value_type: ValueType) -> Self {
        self.request_type = Some(value_type);
        self
    }
    pub fn response(mut self, value_type: ValueType) -> Self {
        self.response_type = Some(value_type);
        self
    }
    pub fn embedded(mut self) -> Self {
        self.embedded = true;
        self
    }
    pub fn bind(mut self, reference_slot: &str, source: ValueSourceDeclaration) -> Self {
        self.bindings.insert(reference_slot.to_string(), source);
        self
    }
}

// ------------- Schema -------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    pub id: SchemaId,
    #[serde(default = "first_version")]
    pub version: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub base_schema_ids: Vec<SchemaId>,
    #[serde(default)]
    pub slots: Vec<SlotDeclaration>,
    #[serde(default)]
    pub links: Vec<LinkDeclaration>,
    #[serde(default)]
    pub key_slot_names: BTreeSet<String>,
    #[serde(default)]
    pub comparable_slot_names: Vec<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

fn first_version() -> u32 {
    1
}

impl Schema {
    pub fn new(id: impl Into<SchemaId>) -> Self {
        Self {
            id: id.into(),
            version: first_version(),
            title: String::new(),
            description: String::new(),
            read_only: false,
            base_schema_ids: Vec::new(),
            slots: Vec::new(),
            links: Vec::new(),
            key_slot_names: BTreeSet::new(),
            comparable_slot_names: Vec::new(),
            tags: BTreeSet::new(),
        }
    }
    pub fn extends(mut self, base: impl Into<SchemaId>) -> Self {
        self.base_schema_ids.push(base.into());
        self
    }
    pub fn slot(mut self, slot: SlotDeclaration) -> Self {
        self.slots.push(slot);
        self
    }
    pub fn link(mut self, link: LinkDeclaration) -> Self {
        self.links.push(link);
        self
    }
    pub fn key(mut self, slot_name: &str) -> Self {
        self.key_slot_names.insert(slot_name.to_string());
        self
    }
    pub fn comparable(mut self, slot_name: &str) -> Self {
        self.comparable_slot_names.push(slot_name.to_string());
        self
    }
    pub fn tag(mut self, tag: &str) -> Self {
        self.tags.insert(tag.to_string());
        self
    }
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
    pub fn title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }
}

// ------------- Schema Source -------------
/// Supplies schemas by identifier.
pub trait SchemaSource: Send + Sync {
    fn get_schema(&self, id: &SchemaId) -> Option<Arc<Schema>>;
}

/// Owns loaded schemas, one per identifier.
#[derive(Debug, Default)]
pub struct SchemaKeeper {
    kept: RwLock<HashMap<SchemaId, Arc<Schema>, SchemaHasher>>,
}

impl SchemaKeeper {
    pub fn new() -> Self {
        Self::default()
    }
    /// Keeps the schema unless one with the same identifier is already kept.
    /// Returns the kept schema and whether it was previously kept.
    pub fn keep(&self, schema: Schema) -> Result<(Arc<Schema>, bool)> {
        let mut kept = self
            .kept
            .write()
            .map_err(|e| ProtoError::Lock(e.to_string()))?;
        match kept.entry(schema.id.clone()) {
            Entry::Occupied(e) => Ok((Arc::clone(e.get()), true)),
            Entry::Vacant(e) => Ok((Arc::clone(e.insert(Arc::new(schema))), false)),
        }
    }
    /// Parses a JSON schema document and keeps it.
    pub fn load_json(&self, document: &str) -> Result<Arc<Schema>> {
        let schema: Schema = serde_json::from_str(document)?;
        let (kept, _) = self.keep(schema)?;
        Ok(kept)
    }
    pub fn ids(&self) -> Vec<SchemaId> {
        match self.kept.read() {
            Ok(kept) => {
                let mut ids: Vec<SchemaId> = kept.keys().cloned().collect();
                ids.sort();
                ids
            }
            Err(_) => Vec::new(),
        }
    }
    pub fn len(&self) -> usize {
        self.kept.read().map(|kept| kept.len()).unwrap_or(0)
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SchemaSource for SchemaKeeper {
    fn get_schema(&self, id: &SchemaId) -> Option<Arc<Schema>> {
        self.kept.read().ok()?.get(id).cloned()
    }
}

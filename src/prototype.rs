//! The compiled, immutable view of one schema and its ancestors.
//!
//! Compilation walks the base-schema closure (depth first, first-seen order),
//! merges slot declarations with the most derived declaration winning, and
//! builds the lookups a prototype answers from: slots by name or alias, link
//! slots by relation, and the accumulated key, comparable and searchable
//! slot names. Referenced prototypes are never compiled from here; slots keep
//! the identifier and resolve it on first use.

use bimap::BiMap;
use lazy_static::lazy_static;
use tracing::warn;

use core::hash::BuildHasherDefault;
use seahash::SeaHasher;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use crate::error::{CompileError, Result, ValidationError};
use crate::schema::{Schema, SchemaId, SchemaSource};
use crate::settings::Settings;
use crate::slot::{CollectionPropertySlot, LinkSlot, PropertySlot, ProtoSlot, SlotBase, SlotKind};
use crate::syntax::Syntax;
use crate::value::{Value, ValueType};

pub type SlotHasher = BuildHasherDefault<SeaHasher>;

lazy_static! {
    // names taken by the model surface itself
    static ref RESERVED_SLOT_NAMES: HashSet<&'static str> =
        ["schemaId", "uri", "hints", "keys", "prototype"].into_iter().collect();
}

fn is_reserved(name: &str, settings: &Settings) -> bool {
    RESERVED_SLOT_NAMES.contains(name) || settings.reserved_slot_names.iter().any(|r| r == name)
}

#[derive(Debug)]
pub struct Prototype {
    schema_id: SchemaId,
    version: u32,
    title: String,
    description: String,
    read_only: bool,
    tags: BTreeSet<String>,
    base_schema_ids: Vec<SchemaId>,
    slot_names: Vec<String>,
    slots: HashMap<String, Arc<ProtoSlot>, SlotHasher>,
    key_slot_names: BTreeSet<String>,
    comparable_slot_names: BTreeSet<String>,
    searchable_slot_names: BTreeSet<String>,
    aliases: HashMap<String, String, SlotHasher>,
    link_relations: BiMap<String, String>,
}

impl Prototype {
    /// Compiles `schema_id` from the schemas supplied by `schemas`. Nothing is
    /// cached here; see [`crate::compiler::PrototypeCompiler`].
    pub fn compile(
        schema_id: &SchemaId,
        schemas: &dyn SchemaSource,
        syntax: &dyn Syntax,
        settings: &Settings,
    ) -> Result<Prototype> {
        let schema = schemas
            .get_schema(schema_id)
            .ok_or_else(|| CompileError::SchemaNotFound {
                schema: schema_id.clone(),
            })?;
        let ancestors = base_closure(&schema, schemas)?;

        let mut prototype = Prototype {
            schema_id: schema.id.clone(),
            version: schema.version,
            title: schema.title.clone(),
            description: schema.description.clone(),
            read_only: schema.read_only,
            tags: schema.tags.clone(),
            base_schema_ids: ancestors.iter().map(|a| a.id.clone()).collect(),
            slot_names: Vec::new(),
            slots: HashMap::default(),
            key_slot_names: BTreeSet::new(),
            comparable_slot_names: BTreeSet::new(),
            searchable_slot_names: BTreeSet::new(),
            aliases: HashMap::default(),
            link_relations: BiMap::new(),
        };

        // the schema itself first, so its declarations override inherited ones
        let lineage: Vec<&Arc<Schema>> = std::iter::once(&schema).chain(ancestors.iter()).collect();
        for declaring in &lineage {
            prototype.merge(declaring, syntax, settings)?;
        }
        prototype.index_aliases(settings)?;
        prototype.check_link_bindings()?;
        for declaring in &lineage {
            prototype.accumulate_names(declaring)?;
        }
        Ok(prototype)
    }

    fn merge(&mut self, declaring: &Schema, syntax: &dyn Syntax, settings: &Settings) -> Result<()> {
        let mut declared_here: HashSet<&str> = HashSet::new();
        let value_slots = declaring.slots.iter().map(|d| {
            let kind = if d.collection.is_some() {
                SlotKind::CollectionProperty
            } else {
                SlotKind::Property
            };
            (d.name.as_str(), kind)
        });
        let link_slots = declaring.links.iter().map(|d| (d.name.as_str(), SlotKind::Link));

        for (name, kind) in value_slots.chain(link_slots).collect::<Vec<_>>() {
            if is_reserved(name, settings) {
                return Err(CompileError::ReservedSlotName {
                    schema: self.schema_id.clone(),
                    slot: name.to_string(),
                }
                .into());
            }
            if !declared_here.insert(name) {
                return Err(CompileError::DuplicateSlot {
                    schema: declaring.id.clone(),
                    slot: name.to_string(),
                }
                .into());
            }
            if let Some(existing) = self.slots.get(name) {
                // an override must keep the slot's kind
                if existing.kind() != kind {
                    return Err(CompileError::SlotKindConflict {
                        schema: self.schema_id.clone(),
                        slot: name.to_string(),
                        first: existing.kind().name(),
                        second: kind.name(),
                    }
                    .into());
                }
            }
        }

        for declaration in &declaring.slots {
            if self.slots.contains_key(&declaration.name) {
                continue;
            }
            let base = SlotBase::new(
                &declaration.name,
                &self.schema_id,
                &declaring.id,
                declaration.value_type.clone(),
                &declaration.title,
                &declaration.description,
                &declaration.aliases,
            );
            let slot = match &declaration.collection {
                Some(collection) => ProtoSlot::CollectionProperty(CollectionPropertySlot::compile(
                    base,
                    declaration,
                    collection,
                    settings.default_result_limit,
                )?),
                None => ProtoSlot::Property(PropertySlot::compile(base, declaration, syntax)?),
            };
            self.insert(slot);
        }

        for declaration in &declaring.links {
            if self.slots.contains_key(&declaration.name) {
                continue;
            }
            if let Some(first) = self.link_relations.get_by_left(&declaration.relation) {
                return Err(CompileError::DuplicateLinkRelation {
                    schema: self.schema_id.clone(),
                    relation: declaration.relation.clone(),
                    first: first.clone(),
                    second: declaration.name.clone(),
                }
                .into());
            }
            let base = SlotBase::new(
                &declaration.name,
                &self.schema_id,
                &declaring.id,
                ValueType::Link,
                &declaration.title,
                &declaration.description,
                &[],
            );
            let slot = LinkSlot::compile(base, declaration)?;
            self.link_relations
                .insert(declaration.relation.clone(), declaration.name.clone());
            self.insert(ProtoSlot::Link(slot));
        }
        Ok(())
    }

    fn insert(&mut self, slot: ProtoSlot) {
        let name = slot.name().to_string();
        if let ProtoSlot::Property(property) = &slot {
            if property.is_searchable() {
                self.searchable_slot_names.insert(name.clone());
            }
        }
        self.slot_names.push(name.clone());
        self.slots.insert(name, Arc::new(slot));
    }

    fn index_aliases(&mut self, settings: &Settings) -> Result<()> {
        let declared: Vec<(String, String)> = self
            .slot_names
            .iter()
            .filter_map(|name| self.slots.get(name))
            .flat_map(|slot| {
                let name = slot.name().to_string();
                slot.base().aliases().iter().map(move |alias| (name.clone(), alias.clone()))
            })
            .collect();
        for (name, alias) in declared {
            let invalid = |reason: String| CompileError::InvalidAlias {
                schema: self.schema_id.clone(),
                slot: name.clone(),
                alias: alias.clone(),
                reason,
            };
            if alias == name {
                return Err(invalid("an alias cannot equal its own slot name".to_string()).into());
            }
            if is_reserved(&alias, settings) {
                return Err(invalid("it is a reserved name".to_string()).into());
            }
            if self.slots.contains_key(&alias) {
                return Err(invalid("it is the name of another slot".to_string()).into());
            }
            if let Some(taken) = self.aliases.get(&alias) {
                return Err(invalid(format!("it is already an alias of '{}'", taken)).into());
            }
            self.aliases.insert(alias, name);
        }
        Ok(())
    }

    fn check_link_bindings(&self) -> Result<()> {
        for property in self.property_slots() {
            let Some(link) = property.link_binding() else {
                continue;
            };
            let bound = self.slots.get(link).map(|slot| slot.kind());
            if bound != Some(SlotKind::Link) {
                return Err(CompileError::UnknownLinkSlot {
                    schema: self.schema_id.clone(),
                    slot: property.name().to_string(),
                    link: link.to_string(),
                }
                .into());
            }
            if !matches!(property.base().value_type(), ValueType::Model { .. }) {
                return Err(CompileError::WrongSlotKind {
                    schema: self.schema_id.clone(),
                    slot: property.name().to_string(),
                    expected: "model-typed",
                }
                .into());
            }
        }
        Ok(())
    }

    fn accumulate_names(&mut self, declaring: &Schema) -> Result<()> {
        for key in &declaring.key_slot_names {
            let real = self
                .real_name(key)
                .map(str::to_string)
                .ok_or_else(|| CompileError::UnknownKeySlot {
                    schema: self.schema_id.clone(),
                    slot: key.clone(),
                })?;
            self.key_slot_names.insert(real);
        }
        for comparable in &declaring.comparable_slot_names {
            match self.real_name(comparable).map(str::to_string) {
                Some(real) => {
                    self.comparable_slot_names.insert(real);
                }
                None => {
                    warn!(schema = %self.schema_id, slot = %comparable, "ignoring unknown comparable slot")
                }
            }
        }
        Ok(())
    }

    pub fn schema_id(&self) -> &SchemaId {
        &self.schema_id
    }
    pub fn version(&self) -> u32 {
        self.version
    }
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn description(&self) -> &str {
        &self.description
    }
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }
    /// Every ancestor, deduplicated, in first-seen depth-first order.
    pub fn base_schema_ids(&self) -> &[SchemaId] {
        &self.base_schema_ids
    }
    pub fn is_a(&self, schema_id: &SchemaId) -> bool {
        &self.schema_id == schema_id || self.base_schema_ids.contains(schema_id)
    }
    /// Own and inherited slot names, own first.
    pub fn slot_names(&self) -> &[String] {
        &self.slot_names
    }
    /// Looks a slot up by its name or one of its aliases.
    pub fn slot(&self, name: &str) -> Option<&Arc<ProtoSlot>> {
        let real = self.real_name(name)?;
        self.slots.get(real)
    }
    pub fn real_name<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        if self.slots.contains_key(name) {
            Some(name)
        } else {
            self.aliases.get(name).map(String::as_str)
        }
    }
    /// All slots in their total order.
    pub fn slots(&self) -> Vec<&Arc<ProtoSlot>> {
        let mut slots: Vec<&Arc<ProtoSlot>> = self.slots.values().collect();
        slots.sort();
        slots
    }
    pub fn property_slots(&self) -> impl Iterator<Item = &PropertySlot> {
        self.slot_names
            .iter()
            .filter_map(|name| self.slots.get(name))
            .filter_map(|slot| slot.as_property())
    }
    /// Names of the plain property slots: no links, no collections.
    pub fn property_slot_names(&self) -> Vec<String> {
        self.property_slots().map(|slot| slot.name().to_string()).collect()
    }
    pub fn collection_slot(&self, name: &str) -> std::result::Result<&CollectionPropertySlot, CompileError> {
        self.slot_of_kind(name, "collection")?
            .as_collection()
            .ok_or_else(|| self.wrong_kind(name, "collection"))
    }
    pub fn link_slot(&self, name: &str) -> std::result::Result<&LinkSlot, CompileError> {
        self.slot_of_kind(name, "link")?
            .as_link()
            .ok_or_else(|| self.wrong_kind(name, "link"))
    }
    pub fn link_slot_by_relation(&self, relation: &str) -> Option<&LinkSlot> {
        let name = self.link_relations.get_by_left(relation)?;
        self.slots.get(name)?.as_link()
    }
    pub fn link_relations(&self) -> &BiMap<String, String> {
        &self.link_relations
    }
    pub fn key_slot_names(&self) -> &BTreeSet<String> {
        &self.key_slot_names
    }
    pub fn comparable_slot_names(&self) -> &BTreeSet<String> {
        &self.comparable_slot_names
    }
    pub fn searchable_slot_names(&self) -> &BTreeSet<String> {
        &self.searchable_slot_names
    }
    /// Alias name to real slot name.
    pub fn aliases(&self) -> &HashMap<String, String, SlotHasher> {
        &self.aliases
    }

    /// Checks a write of `value` to `slot_name` and returns the real slot
    /// name to store it under.
    pub fn validate_write<'a>(
        &'a self,
        slot_name: &'a str,
        value: &Value,
    ) -> std::result::Result<&'a str, ValidationError> {
        let slot = self.slot(slot_name).ok_or_else(|| ValidationError::UnknownSlot {
            slot: slot_name.to_string(),
            schema: self.schema_id.clone(),
        })?;
        if self.read_only {
            return Err(ValidationError::ReadOnly {
                slot: slot.name().to_string(),
                schema: self.schema_id.clone(),
            });
        }
        match &**slot {
            ProtoSlot::Property(property) => {
                property.validate(value)?;
                Ok(property.name())
            }
            other => Err(ValidationError::NotWritable {
                slot: other.name().to_string(),
                kind: other.kind().name(),
            }),
        }
    }

    fn slot_of_kind(&self, name: &str, expected: &'static str) -> std::result::Result<&Arc<ProtoSlot>, CompileError> {
        self.slot(name).ok_or_else(|| self.wrong_kind(name, expected))
    }

    fn wrong_kind(&self, name: &str, expected: &'static str) -> CompileError {
        CompileError::WrongSlotKind {
            schema: self.schema_id.clone(),
            slot: name.to_string(),
            expected,
        }
    }
}

/// Depth-first, first-seen closure of the base schemas of `schema`.
fn base_closure(schema: &Arc<Schema>, schemas: &dyn SchemaSource) -> Result<Vec<Arc<Schema>>> {
    let mut closure: Vec<Arc<Schema>> = Vec::new();
    let mut seen: HashSet<SchemaId> = HashSet::new();
    let mut path: Vec<SchemaId> = vec![schema.id.clone()];
    visit_bases(schema, schemas, &mut closure, &mut seen, &mut path)?;
    Ok(closure)
}

fn visit_bases(
    schema: &Schema,
    schemas: &dyn SchemaSource,
    closure: &mut Vec<Arc<Schema>>,
    seen: &mut HashSet<SchemaId>,
    path: &mut Vec<SchemaId>,
) -> Result<()> {
    for base_id in &schema.base_schema_ids {
        if path.contains(base_id) {
            let mut cycle = path.clone();
            cycle.push(base_id.clone());
            return Err(CompileError::CyclicInheritance {
                schema: path[0].clone(),
                cycle,
            }
            .into());
        }
        if !seen.insert(base_id.clone()) {
            continue;
        }
        let base = schemas
            .get_schema(base_id)
            .ok_or_else(|| CompileError::SchemaNotFound {
                schema: base_id.clone(),
            })?;
        closure.push(Arc::clone(&base));
        path.push(base_id.clone());
        visit_bases(&base, schemas, closure, seen, path)?;
        path.pop();
    }
    Ok(())
}

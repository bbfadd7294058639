//! The process-wide prototype cache.
//!
//! [`PrototypeCompiler`] owns the schema source, the syntax used for every
//! text coercion and the settings, and hands out `Arc<Prototype>` values
//! memoized by schema id. Slots that reference other schemas (including their
//! own) come back here on first use, after the owning prototype is cached.

use dashmap::DashMap;
use tracing::{debug, info, warn};

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::Result;
use crate::model::{Model, ModelHandle};
use crate::prototype::Prototype;
use crate::schema::{SchemaId, SchemaSource, ValueSourceDeclaration};
use crate::search::{SearchCriteria, build_search_criteria};
use crate::settings::Settings;
use crate::syntax::{DefaultSyntax, Syntax};
use crate::value::Value;
use crate::value_source::ProtoValueSource;

pub struct PrototypeCompiler {
    schemas: Arc<dyn SchemaSource>,
    syntax: Arc<dyn Syntax>,
    settings: Settings,
    prototypes: DashMap<SchemaId, Arc<Prototype>>,
}

impl PrototypeCompiler {
    pub fn new(schemas: Arc<dyn SchemaSource>) -> Self {
        Self {
            schemas,
            syntax: Arc::new(DefaultSyntax),
            settings: Settings::default(),
            prototypes: DashMap::new(),
        }
    }
    pub fn with_syntax(mut self, syntax: Arc<dyn Syntax>) -> Self {
        self.syntax = syntax;
        self
    }
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn syntax(&self) -> &dyn Syntax {
        self.syntax.as_ref()
    }
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
    pub fn schemas(&self) -> &dyn SchemaSource {
        self.schemas.as_ref()
    }

    /// Returns the cached prototype for `schema_id`, compiling it on first
    /// request. Failures are reported and not cached, so a later request
    /// compiles again. When two threads compile the same id at once the first
    /// stored prototype is the one everybody gets.
    pub fn get_prototype(&self, schema_id: &SchemaId) -> Result<Arc<Prototype>> {
        // clone out and drop the guard, compilation may come back here
        if let Some(cached) = self.prototypes.get(schema_id).map(|entry| Arc::clone(entry.value())) {
            debug!(schema = %schema_id, "prototype cache hit");
            return Ok(cached);
        }
        let compiled = match self.compile(schema_id) {
            Ok(prototype) => prototype,
            Err(e) => {
                warn!(schema = %schema_id, error = %e, "prototype compilation failed");
                return Err(e);
            }
        };
        info!(
            schema = %schema_id,
            slots = compiled.slot_names().len(),
            keys = compiled.key_slot_names().len(),
            bases = compiled.base_schema_ids().len(),
            "compiled prototype"
        );
        let kept = self
            .prototypes
            .entry(schema_id.clone())
            .or_insert_with(|| Arc::new(compiled));
        Ok(Arc::clone(kept.value()))
    }

    /// Compiles without looking at or filling the cache.
    pub fn compile(&self, schema_id: &SchemaId) -> Result<Prototype> {
        Prototype::compile(schema_id, self.schemas.as_ref(), self.syntax.as_ref(), &self.settings)
    }

    pub fn is_compiled(&self, schema_id: &SchemaId) -> bool {
        self.prototypes.contains_key(schema_id)
    }
    pub fn compiled_count(&self) -> usize {
        self.prototypes.len()
    }

    /// Builds a value source binding `reference_slot` of the reference schema
    /// to something relative to instances of the referrer schema.
    pub fn value_source(
        &self,
        reference_schema_id: &SchemaId,
        reference_slot: &str,
        referrer_schema_id: &SchemaId,
        declaration: &ValueSourceDeclaration,
    ) -> Result<ProtoValueSource> {
        let reference = self.get_prototype(reference_schema_id)?;
        let referrer = self.get_prototype(referrer_schema_id)?;
        ProtoValueSource::new(&reference, reference_slot, &referrer, declaration, self.syntax())
    }

    /// Search criteria for the collection slot `slot_name` of `referrer`.
    pub fn build_search_criteria(&self, referrer: &ModelHandle, slot_name: &str) -> Result<SearchCriteria> {
        let prototype = self.get_prototype(referrer.schema_id())?;
        let slot = prototype.collection_slot(slot_name)?;
        build_search_criteria(self, slot, referrer)
    }

    /// Request parameters for following the link slot `link_slot_name` of `referrer`.
    pub fn resolve_link_bindings(
        &self,
        referrer: &dyn Model,
        link_slot_name: &str,
    ) -> Result<BTreeMap<String, Option<Value>>> {
        let prototype = self.get_prototype(referrer.schema_id())?;
        prototype.link_slot(link_slot_name)?.resolve_bindings(self, referrer)
    }
}

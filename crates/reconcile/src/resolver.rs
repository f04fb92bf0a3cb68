//! Natural-key entity lookups.
//!
//! Users address entities by name (or title, or login), the API by
//! numeric id. The resolver turns names into server records: explicit
//! lookups for the entity a command operates on, and bulk resolution
//! of every reference field in a desired state.

use apikit::{Client, Scope, SearchQuery};
use serde_json::Value;

use crate::diff;
use crate::error::{Error, Result};
use crate::spec::{DesiredState, EntityRef, EntitySpec, FieldKind};

/// How much of a matched entity to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detail {
    /// Id and name only, enough to reference the entity. Asks the
    /// server for a thin listing; servers that do not support thin
    /// listings return full records, which is also fine.
    Thin,
    /// The complete record, fetched with a follow-up show request.
    Full,
}

/// Scope built from already resolved sibling fields.
///
/// `fields` names reference fields of `spec` whose resolved ids narrow
/// a lookup or write, e.g. the owning organization.
pub fn scope_for(spec: &EntitySpec, fields: &[String], desired: &DesiredState) -> Result<Scope> {
    let mut scope = Scope::new();
    for name in fields {
        let id = desired
            .get(name)
            .and_then(|record| record.get("id"))
            .cloned()
            .ok_or_else(|| {
                Error::validation(format!("{name} must be resolved before it can scope a lookup"))
            })?;
        scope.insert(spec.wire_name(name).to_string(), id);
    }
    Ok(scope)
}

/// Turns natural keys into server records.
pub struct Resolver<'a> {
    client: &'a dyn Client,
}

impl<'a> Resolver<'a> {
    /// Resolver talking to the given client.
    pub fn new(client: &'a dyn Client) -> Self {
        Self { client }
    }

    /// Search for at most one entity; `Ok(None)` when nothing matches
    /// and an error when the query is ambiguous.
    pub fn find_one(
        &self,
        resource: &str,
        query: &SearchQuery,
        scope: &Scope,
        detail: Detail,
    ) -> Result<Option<Value>> {
        let search = query.to_string();
        let mut listing = scope.clone();
        if matches!(detail, Detail::Thin) {
            listing.insert("thin", true);
        }
        log::debug!("searching {resource} for {search}");
        let mut found = self.client.list(resource, Some(&search), &listing)?;
        if found.len() > 1 {
            return Err(Error::ambiguous(resource, search));
        }
        let Some(record) = found.pop() else {
            return Ok(None);
        };
        match detail {
            Detail::Thin => Ok(Some(record)),
            Detail::Full => {
                let id = diff::id_of(&record)?;
                Ok(Some(self.client.show(resource, &id, scope)?))
            }
        }
    }

    /// Like [`find_one`](Self::find_one), but a miss is an error.
    pub fn require_one(
        &self,
        resource: &str,
        query: &SearchQuery,
        scope: &Scope,
        detail: Detail,
    ) -> Result<Value> {
        self.find_one(resource, query, scope, detail)?
            .ok_or_else(|| Error::lookup(resource, query.to_string()))
    }

    /// Search by a single field's value.
    pub fn find_by(
        &self,
        resource: &str,
        field: &str,
        value: &str,
        scope: &Scope,
        detail: Detail,
    ) -> Result<Option<Value>> {
        self.find_one(resource, &SearchQuery::new().eq(field, value), scope, detail)
    }

    /// Resolve several entities of one resource by the same field.
    ///
    /// Each name is looked up independently; one error aggregates every
    /// name that did not match. With `failsafe`, misses are dropped from
    /// the result instead.
    pub fn find_many(
        &self,
        resource: &str,
        field: &str,
        names: &[String],
        scope: &Scope,
        failsafe: bool,
    ) -> Result<Vec<Value>> {
        let mut resolved = Vec::with_capacity(names.len());
        let mut missing = Vec::new();
        for name in names {
            let query = SearchQuery::new().eq(field, name.as_str());
            match self.find_one(resource, &query, scope, Detail::Thin)? {
                Some(record) => resolved.push(record),
                None if failsafe => {}
                None => missing.push(query.to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(Error::lookup(resource, missing.join(" or ")));
        }
        Ok(resolved)
    }

    /// Resolve every reference field of `desired` to a server record.
    ///
    /// String values are looked up by the reference's search field;
    /// records and nulls pass through untouched. An empty string clears
    /// the reference. Fields that scope other references resolve first.
    pub fn resolve_references(&self, spec: &EntitySpec, desired: &mut DesiredState) -> Result<()> {
        self.resolve_fields(spec, desired, &reference_order(spec))
    }

    /// Resolve only the named reference fields, leaving the rest alone.
    ///
    /// Deletions use this: the lookup scope must resolve, but other
    /// references may dangle without failing the run.
    pub fn resolve_fields(
        &self,
        spec: &EntitySpec,
        desired: &mut DesiredState,
        fields: &[String],
    ) -> Result<()> {
        for key in fields {
            let Some(field) = spec.field(key) else {
                continue;
            };
            let Some(target) = field.entity_ref() else {
                continue;
            };
            match field.kind() {
                FieldKind::Entity(_) => self.resolve_one(spec, key, target, desired)?,
                FieldKind::EntityList(_) => self.resolve_list(spec, key, target, desired)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn resolve_one(
        &self,
        spec: &EntitySpec,
        key: &str,
        target: &EntityRef,
        desired: &mut DesiredState,
    ) -> Result<()> {
        let name = match desired.get(key) {
            Some(Value::String(name)) => name.clone(),
            _ => return Ok(()),
        };
        if name.is_empty() {
            desired.insert(key.to_string(), Value::Null);
            return Ok(());
        }
        let scope = scope_for(spec, &target.scope, desired)?;
        let query = SearchQuery::new().eq(target.search_field(), &name);
        let record = if target.failsafe {
            self.find_one(&target.resource, &query, &scope, Detail::Thin)?
        } else {
            Some(self.require_one(&target.resource, &query, &scope, Detail::Thin)?)
        };
        desired.insert(key.to_string(), record.unwrap_or(Value::Null));
        Ok(())
    }

    fn resolve_list(
        &self,
        spec: &EntitySpec,
        key: &str,
        target: &EntityRef,
        desired: &mut DesiredState,
    ) -> Result<()> {
        let Some(Value::Array(items)) = desired.get(key).cloned() else {
            return Ok(());
        };
        let scope = scope_for(spec, &target.scope, desired)?;
        let names: Vec<String> = items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
        let mut resolved = self.find_many(
            &target.resource,
            target.search_field(),
            &names,
            &scope,
            target.failsafe,
        )?;
        // Items given as records pass through unresolved; id order does
        // not matter, lists compare and flatten as id sets.
        resolved.extend(items.into_iter().filter(|item| !item.is_string()));
        desired.insert(key.to_string(), Value::Array(resolved));
        Ok(())
    }
}

/// Reference fields in resolution order: fields that scope another
/// reference come first, the rest keep their name order.
fn reference_order(spec: &EntitySpec) -> Vec<String> {
    let providers: Vec<String> = spec
        .fields()
        .filter_map(|(_, field)| field.entity_ref())
        .flat_map(|target| target.scope.iter().cloned())
        .collect();
    let mut order: Vec<String> = spec
        .fields()
        .filter(|(_, field)| field.entity_ref().is_some())
        .map(|(key, _)| key.clone())
        .collect();
    order.sort_by_key(|key| !providers.contains(key));
    order
}

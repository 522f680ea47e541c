//! # Indexer
//!
//! Uniform get/set/delete over `Selector<E> x AttributeSelector`.
//!
//! Reads go straight to the store. Writes go through the session's
//! interception pipeline, one pipeline pass per store primitive call.
//!
//! ## Dispatch Rules
//!
//! | entity axis | get | set / delete |
//! |---|---|---|
//! | `Single` | value or attribute map of one entity | that entity |
//! | `Many` | map keyed by index; any absent key fails before reading | broadcast, checked before writing |
//! | `Predicate` (multiplicity) | as `Many`; no match is an empty map | no match is a no-op |
//! | `Predicate` (singular) | as `Single`; no match is `NoResults` | no match is a no-op |
//! | `All` | snapshot of existing entities, then as `Many` | broadcast |
//!
//! On the attribute axis, `All` on `set` overwrites only the attributes
//! present at call time, and on `delete` replaces each set with an empty one.

use crate::entity::Entity;
use crate::selector::{AttributeSelector, AttributeTargets, Selector, Targets};
use crate::session::Session;
use crate::types::{Attribute, Attributes, TrellisError, Value};
use serde::Serialize;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use tracing::debug;

// =============================================================================
// LOOKUP RESULT
// =============================================================================

/// Result of [`Indexer::get`]. The variant follows the selector shapes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Lookup<I: Ord> {
    /// One entity, one attribute.
    Value(Value),
    /// One entity, several or all attributes.
    Attributes(Attributes),
    /// Several entities, one attribute.
    Values(BTreeMap<I, Value>),
    /// Several entities, several or all attributes.
    Entities(BTreeMap<I, Attributes>),
}

impl<I: Ord> Lookup<I> {
    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_value(self) -> Result<Value, TrellisError> {
        match self {
            Self::Value(value) => Ok(value),
            other => Err(other.mismatch("a single value")),
        }
    }

    pub fn into_attributes(self) -> Result<Attributes, TrellisError> {
        match self {
            Self::Attributes(attributes) => Ok(attributes),
            other => Err(other.mismatch("one attribute map")),
        }
    }

    pub fn into_values(self) -> Result<BTreeMap<I, Value>, TrellisError> {
        match self {
            Self::Values(values) => Ok(values),
            other => Err(other.mismatch("values keyed by index")),
        }
    }

    pub fn into_entities(self) -> Result<BTreeMap<I, Attributes>, TrellisError> {
        match self {
            Self::Entities(entities) => Ok(entities),
            other => Err(other.mismatch("attribute maps keyed by index")),
        }
    }

    const fn variant_name(&self) -> &'static str {
        match self {
            Self::Value(_) => "Value",
            Self::Attributes(_) => "Attributes",
            Self::Values(_) => "Values",
            Self::Entities(_) => "Entities",
        }
    }

    fn mismatch(&self, expected: &str) -> TrellisError {
        TrellisError::Conversion(format!(
            "expected {expected}, the lookup holds {}",
            self.variant_name()
        ))
    }
}

// =============================================================================
// INDEXER
// =============================================================================

/// Two-axis accessor returned by [`Session::node`] and [`Session::edge`].
#[derive(Debug)]
pub struct Indexer<'a, E: Entity> {
    session: &'a mut Session,
    entity: PhantomData<E>,
}

impl<'a, E: Entity> Indexer<'a, E> {
    pub(crate) fn new(session: &'a mut Session) -> Self {
        Self {
            session,
            entity: PhantomData,
        }
    }

    /// Read attributes.
    ///
    /// # Errors
    ///
    /// - `NodeNotFound`/`EdgeNotFound` for an absent explicit key
    /// - `MissingAttribute` for an explicitly named attribute that is absent
    /// - `NoResults` when a singular predicate on either axis matches nothing
    pub fn get(
        &self,
        entities: impl Into<Selector<E>>,
        attributes: impl Into<AttributeSelector>,
    ) -> Result<Lookup<E::Index>, TrellisError> {
        let store = self.session.store();
        let targets = entities.into().resolve(store)?;
        let names = attributes.into().resolve(store)?;
        debug!(entity = %E::KIND, ?targets, ?names, "indexer get");

        match targets {
            Targets::Nothing => Err(TrellisError::NoResults),
            Targets::One(index) => {
                let mut found = E::attributes(store, std::slice::from_ref(&index))?;
                let attributes = found.remove(&index).unwrap_or_default();
                Ok(match names {
                    AttributeTargets::One(name) => {
                        Lookup::Value(take::<E>(&index, &attributes, &name)?)
                    }
                    AttributeTargets::Many(names) => {
                        Lookup::Attributes(subset::<E>(&index, &attributes, &names)?)
                    }
                    AttributeTargets::All => Lookup::Attributes(attributes),
                    AttributeTargets::Nothing => return Err(TrellisError::NoResults),
                })
            }
            Targets::Many(indices) => {
                let found = E::attributes(store, &indices)?;
                Ok(match names {
                    AttributeTargets::One(name) => Lookup::Values(
                        found
                            .iter()
                            .map(|(index, attributes)| {
                                Ok((index.clone(), take::<E>(index, attributes, &name)?))
                            })
                            .collect::<Result<_, TrellisError>>()?,
                    ),
                    AttributeTargets::Many(names) => Lookup::Entities(
                        found
                            .iter()
                            .map(|(index, attributes)| {
                                Ok((index.clone(), subset::<E>(index, attributes, &names)?))
                            })
                            .collect::<Result<_, TrellisError>>()?,
                    ),
                    AttributeTargets::All => Lookup::Entities(found),
                    AttributeTargets::Nothing => return Err(TrellisError::NoResults),
                })
            }
        }
    }

    /// Create or overwrite attributes.
    ///
    /// A single name is one store call for every target. A name list is one
    /// call per name, in list order. `All` snapshots the present attributes
    /// first and only overwrites those.
    pub fn set(
        &mut self,
        entities: impl Into<Selector<E>>,
        attributes: impl Into<AttributeSelector>,
        value: impl Into<Value>,
    ) -> Result<(), TrellisError> {
        let value = value.into();
        let Some((indices, names)) = self.write_targets(entities.into(), attributes.into())? else {
            return Ok(());
        };
        debug!(entity = %E::KIND, count = indices.len(), ?names, "indexer set");

        match names {
            AttributeTargets::One(name) => self.session.update_attribute::<E>(indices, name, value),
            AttributeTargets::Many(names) => {
                for name in names {
                    self.session
                        .update_attribute::<E>(indices.clone(), name, value.clone())?;
                }
                Ok(())
            }
            AttributeTargets::All => {
                for (name, carriers) in self.present_attributes(&indices)? {
                    self.session
                        .update_attribute::<E>(carriers, name, value.clone())?;
                }
                Ok(())
            }
            AttributeTargets::Nothing => Ok(()),
        }
    }

    /// Remove attributes.
    ///
    /// Named attributes must exist on every target; all of them are checked
    /// before the first removal. `All` clears each attribute set.
    pub fn delete(
        &mut self,
        entities: impl Into<Selector<E>>,
        attributes: impl Into<AttributeSelector>,
    ) -> Result<(), TrellisError> {
        let Some((indices, names)) = self.write_targets(entities.into(), attributes.into())? else {
            return Ok(());
        };
        debug!(entity = %E::KIND, count = indices.len(), ?names, "indexer delete");

        match names {
            AttributeTargets::One(name) => self.session.remove_attribute::<E>(indices, name),
            AttributeTargets::Many(names) => {
                let found = E::attributes(self.session.store(), &indices)?;
                for (index, attributes) in &found {
                    subset::<E>(index, attributes, &names)?;
                }
                for name in names {
                    self.session.remove_attribute::<E>(indices.clone(), name)?;
                }
                Ok(())
            }
            AttributeTargets::All => self
                .session
                .replace_attributes::<E>(indices, Attributes::new()),
            AttributeTargets::Nothing => Ok(()),
        }
    }

    /// Replace whole attribute sets.
    pub fn replace(
        &mut self,
        entities: impl Into<Selector<E>>,
        attributes: Attributes,
    ) -> Result<(), TrellisError> {
        let indices = entities.into().resolve(self.session.store())?.into_vec();
        if indices.is_empty() {
            return Ok(());
        }
        self.session.replace_attributes::<E>(indices, attributes)
    }

    /// Resolve both axes for a write. `None` when either axis selects nothing.
    fn write_targets(
        &self,
        entities: Selector<E>,
        attributes: AttributeSelector,
    ) -> Result<Option<(Vec<E::Index>, AttributeTargets)>, TrellisError> {
        let store = self.session.store();
        let indices = entities.resolve(store)?.into_vec();
        let names = attributes.resolve(store)?;
        if indices.is_empty() || names == AttributeTargets::Nothing {
            debug!(entity = %E::KIND, "write selects nothing");
            return Ok(None);
        }
        Ok(Some((indices, names)))
    }

    /// Present attribute names, each with the targets that carry it.
    fn present_attributes(
        &self,
        indices: &[E::Index],
    ) -> Result<BTreeMap<Attribute, Vec<E::Index>>, TrellisError> {
        let mut carriers: BTreeMap<Attribute, Vec<E::Index>> = BTreeMap::new();
        for (index, attributes) in E::attributes(self.session.store(), indices)? {
            for name in attributes.into_keys() {
                carriers.entry(name).or_default().push(index.clone());
            }
        }
        Ok(carriers)
    }
}

fn missing<E: Entity>(index: &E::Index, attribute: &Attribute) -> TrellisError {
    TrellisError::MissingAttribute {
        entity: E::key(index.clone()),
        attribute: attribute.clone(),
    }
}

fn take<E: Entity>(
    index: &E::Index,
    attributes: &Attributes,
    name: &Attribute,
) -> Result<Value, TrellisError> {
    attributes
        .get(name)
        .cloned()
        .ok_or_else(|| missing::<E>(index, name))
}

fn subset<E: Entity>(
    index: &E::Index,
    attributes: &Attributes,
    names: &[Attribute],
) -> Result<Attributes, TrellisError> {
    names
        .iter()
        .map(|name| Ok((name.clone(), take::<E>(index, attributes, name)?)))
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================

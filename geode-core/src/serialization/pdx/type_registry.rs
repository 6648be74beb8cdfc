//! Session registry of PDX type definitions and enum constants.

use std::collections::HashMap;
use std::sync::Arc;

use super::{rabin_fingerprint_64, PdxType};
use crate::error::{GeodeError, Result};
use crate::serialization::snapshot::SnapshotMap;
use crate::serialization::value::EnumInfo;

const MAX_PROBES: usize = 4096;

fn fold_fingerprint(fp: i64) -> i32 {
    let folded = (fp ^ (fp >> 32)) as i32 & i32::MAX;
    if folded == 0 {
        1
    } else {
        folded
    }
}

fn next_id(id: i32) -> i32 {
    if id == i32::MAX {
        1
    } else {
        id + 1
    }
}

enum Probe<T> {
    Found(i32, T),
    Free(i32),
}

fn probe<V>(
    map: &HashMap<i32, V>,
    start: i32,
    matches: impl Fn(&V) -> bool,
) -> Result<Probe<&V>> {
    let mut id = start;
    for _ in 0..MAX_PROBES {
        match map.get(&id) {
            Some(existing) if matches(existing) => return Ok(Probe::Found(id, existing)),
            Some(_) => id = next_id(id),
            None => return Ok(Probe::Free(id)),
        }
    }
    Err(GeodeError::Configuration(format!(
        "no free PDX id within {MAX_PROBES} slots of {start}"
    )))
}

/// Registry for PDX types and enums known to one session.
///
/// IDs are allocated locally from a fingerprint of the definition, so the
/// same definition always receives the same ID within a session.
#[derive(Debug)]
pub struct PdxTypeRegistry {
    types: SnapshotMap<i32, Arc<PdxType>>,
    enums: SnapshotMap<i32, EnumInfo>,
    enum_ids: SnapshotMap<EnumInfo, i32>,
}

impl PdxTypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            types: SnapshotMap::new(),
            enums: SnapshotMap::new(),
            enum_ids: SnapshotMap::new(),
        }
    }

    /// Returns the numbered definition for `pdx_type`, defining it on first use.
    pub fn define_type(&self, pdx_type: PdxType) -> Result<Arc<PdxType>> {
        let start = fold_fingerprint(pdx_type.fingerprint());
        if let Probe::Found(_, existing) =
            probe(&self.types.load(), start, |t| t.same_layout(&pdx_type))?
        {
            return Ok(Arc::clone(existing));
        }
        self.types.update(|types| match probe(types, start, |t| t.same_layout(&pdx_type))? {
            Probe::Found(_, existing) => Ok(Arc::clone(existing)),
            Probe::Free(id) => {
                let defined = Arc::new(pdx_type.with_type_id(id));
                tracing::debug!(
                    class_name = defined.class_name(),
                    type_id = id,
                    fields = defined.field_count(),
                    "defined PDX type"
                );
                types.insert(id, Arc::clone(&defined));
                Ok(defined)
            }
        })
    }

    /// Adds a definition received with its ID already assigned.
    pub fn add_type(&self, pdx_type: PdxType) -> Result<Arc<PdxType>> {
        let id = pdx_type.type_id();
        self.types.update(|types| match types.get(&id) {
            Some(existing) if existing.same_layout(&pdx_type) => Ok(Arc::clone(existing)),
            Some(existing) => Err(GeodeError::Protocol(format!(
                "PDX type id {id} already names {}",
                existing.class_name()
            ))),
            None => {
                let added = Arc::new(pdx_type);
                types.insert(id, Arc::clone(&added));
                Ok(added)
            }
        })
    }

    /// Looks up a type by ID.
    pub fn get_type(&self, type_id: i32) -> Option<Arc<PdxType>> {
        self.types.get(&type_id)
    }

    /// Returns the ID of an enum constant, assigning one on first use.
    pub fn get_or_define_enum(&self, info: &EnumInfo) -> Result<i32> {
        if let Some(id) = self.enum_ids.get(info) {
            return Ok(id);
        }
        let mut data = Vec::with_capacity(info.class_name.len() + info.name.len());
        data.extend_from_slice(info.class_name.as_bytes());
        data.extend_from_slice(info.name.as_bytes());
        let start = fold_fingerprint(rabin_fingerprint_64(&data));
        let id = self.enums.update(|enums| match probe(enums, start, |e| e == info)? {
            Probe::Found(id, _) => Ok::<_, GeodeError>(id),
            Probe::Free(id) => {
                enums.insert(id, info.clone());
                Ok(id)
            }
        })?;
        self.enum_ids.update(|ids| {
            ids.insert(info.clone(), id);
            Ok::<_, GeodeError>(())
        })?;
        tracing::debug!(class_name = %info.class_name, name = %info.name, enum_id = id, "defined PDX enum");
        Ok(id)
    }

    /// Looks up an enum constant by ID.
    pub fn get_enum(&self, enum_id: i32) -> Option<EnumInfo> {
        self.enums.get(&enum_id)
    }

    /// Number of defined types.
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Number of defined enum constants.
    pub fn enum_count(&self) -> usize {
        self.enums.len()
    }

    /// Forgets every type and enum.
    pub fn clear(&self) {
        self.types.clear();
        self.enums.clear();
        self.enum_ids.clear();
    }
}

impl Default for PdxTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

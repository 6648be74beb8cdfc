//! Local-name to PDX-name mapping.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::error::{GeodeError, Result};
use crate::serialization::snapshot::SnapshotMap;

/// Translates between application class names and PDX type names.
///
/// Each direction is called at most once per name and session; the answers
/// are cached and must form a bijection. Returning `None` is fatal.
pub trait PdxTypeMapper: Send + Sync {
    /// Maps a local class name to the name used on the wire.
    fn to_pdx_type_name(&self, local_name: &str) -> Option<String>;

    /// Maps a wire name back to the local class name.
    fn from_pdx_type_name(&self, pdx_type_name: &str) -> Option<String>;
}

/// Uses local names unchanged on the wire.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityPdxTypeMapper;

impl PdxTypeMapper for IdentityPdxTypeMapper {
    fn to_pdx_type_name(&self, local_name: &str) -> Option<String> {
        Some(local_name.to_string())
    }

    fn from_pdx_type_name(&self, pdx_type_name: &str) -> Option<String> {
        Some(pdx_type_name.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum NameKey {
    Local(String),
    Pdx(String),
}

/// The session's mapper together with every name pair it has produced.
pub(crate) struct PdxNameCache {
    mapper: ArcSwap<Arc<dyn PdxTypeMapper>>,
    names: SnapshotMap<NameKey, String>,
}

impl PdxNameCache {
    pub(crate) fn new() -> Self {
        let mapper: Arc<dyn PdxTypeMapper> = Arc::new(IdentityPdxTypeMapper);
        Self {
            mapper: ArcSwap::from_pointee(mapper),
            names: SnapshotMap::new(),
        }
    }

    /// Installs a mapper; only allowed before any name has been resolved.
    pub(crate) fn set_mapper(&self, mapper: Arc<dyn PdxTypeMapper>) -> Result<()> {
        self.names.update(|names| {
            if !names.is_empty() {
                return Err(GeodeError::Configuration(
                    "PDX type mapper must be set before the first PDX name is resolved"
                        .to_string(),
                ));
            }
            self.mapper.store(Arc::new(mapper));
            Ok(())
        })
    }

    fn current_mapper(&self) -> Arc<dyn PdxTypeMapper> {
        Arc::clone(&**self.mapper.load())
    }

    pub(crate) fn to_pdx(&self, local_name: &str) -> Result<String> {
        let key = NameKey::Local(local_name.to_string());
        if let Some(pdx_name) = self.names.get(&key) {
            return Ok(pdx_name);
        }
        loop {
            let mapper = self.current_mapper();
            let pdx_name = mapper.to_pdx_type_name(local_name).ok_or_else(|| {
                GeodeError::PdxTypeMapper(format!("mapper returned no PDX name for {local_name}"))
            })?;
            if let Some((_, pdx)) = self.record(local_name, &pdx_name, &mapper)? {
                return Ok(pdx);
            }
        }
    }

    pub(crate) fn from_pdx(&self, pdx_name: &str) -> Result<String> {
        let key = NameKey::Pdx(pdx_name.to_string());
        if let Some(local_name) = self.names.get(&key) {
            return Ok(local_name);
        }
        loop {
            let mapper = self.current_mapper();
            let local_name = mapper.from_pdx_type_name(pdx_name).ok_or_else(|| {
                GeodeError::PdxTypeMapper(format!("mapper returned no local name for {pdx_name}"))
            })?;
            if let Some((local, _)) = self.record(&local_name, pdx_name, &mapper)? {
                return Ok(local);
            }
        }
    }

    /// Publishes a pair, keeping whichever pair won a concurrent first use.
    ///
    /// Returns `None` without publishing when `mapper` has been replaced since
    /// it produced the pair.
    fn record(
        &self,
        local_name: &str,
        pdx_name: &str,
        mapper: &Arc<dyn PdxTypeMapper>,
    ) -> Result<Option<(String, String)>> {
        self.names.update(|names| {
            if !Arc::ptr_eq(&**self.mapper.load(), mapper) {
                return Ok(None);
            }
            let local_key = NameKey::Local(local_name.to_string());
            let pdx_key = NameKey::Pdx(pdx_name.to_string());
            let existing = (names.get(&local_key).cloned(), names.get(&pdx_key).cloned());
            match existing {
                (None, None) => {
                    names.insert(local_key, pdx_name.to_string());
                    names.insert(pdx_key, local_name.to_string());
                    tracing::debug!(local_name, pdx_name, "resolved PDX type name");
                    Ok(Some((local_name.to_string(), pdx_name.to_string())))
                }
                (Some(mapped), Some(back)) if mapped == pdx_name && back == local_name => {
                    Ok(Some((local_name.to_string(), pdx_name.to_string())))
                }
                (mapped, back) => {
                    tracing::warn!(
                        local_name,
                        pdx_name,
                        existing_pdx_name = mapped.as_deref(),
                        existing_local_name = back.as_deref(),
                        "PDX type mapper broke the name bijection"
                    );
                    Err(GeodeError::PdxTypeMapper(format!(
                        "mapping {local_name} <-> {pdx_name} conflicts with an earlier mapping"
                    )))
                }
            }
        })
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.names.len() == 0
    }

    pub(crate) fn clear(&self) {
        self.names.clear();
    }
}

impl fmt::Debug for PdxNameCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdxNameCache")
            .field("resolved", &(self.names.len() / 2))
            .finish()
    }
}

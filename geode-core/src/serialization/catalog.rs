//! Name-based type lookup for classes that were never registered.
//!
//! A [`TypeCatalog`] stands in for the set of code modules loaded by the
//! application. Each [`CatalogModule`] lists the fully-qualified type names
//! it defines, a zero-argument constructor for each where one exists, and
//! the modules it references. Lookups search every loaded module and,
//! breadth-first, the modules they reference.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use super::data_serializable::DataSerializable;
use super::pdx::PdxSerializable;
use super::snapshot::SnapshotMap;
use super::value::ObjectArray;
use crate::error::{GeodeError, Result};

/// A freshly constructed catalog object.
#[derive(Debug)]
pub enum CatalogObject {
    /// A PDX-serializable instance.
    Pdx(Box<dyn PdxSerializable>),
    /// A data-serializable instance.
    DataSerializable(Box<dyn DataSerializable>),
}

/// Zero-argument constructor for a catalog type.
pub type CatalogConstructor = Arc<dyn Fn() -> CatalogObject + Send + Sync>;

/// One code module: the types it defines and the modules it references.
#[derive(Clone)]
pub struct CatalogModule {
    name: String,
    types: HashMap<String, Option<CatalogConstructor>>,
    references: Vec<String>,
}

impl CatalogModule {
    /// An empty module.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: HashMap::new(),
            references: Vec::new(),
        }
    }

    /// The module's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a PDX type with its constructor.
    pub fn add_pdx_type<F>(&mut self, type_name: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn() -> Box<dyn PdxSerializable> + Send + Sync + 'static,
    {
        let constructor: CatalogConstructor = Arc::new(move || CatalogObject::Pdx(constructor()));
        self.types.insert(type_name.into(), Some(constructor));
        self
    }

    /// Adds a data-serializable type with its constructor.
    pub fn add_data_serializable_type<F>(&mut self, type_name: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn() -> Box<dyn DataSerializable> + Send + Sync + 'static,
    {
        let constructor: CatalogConstructor =
            Arc::new(move || CatalogObject::DataSerializable(constructor()));
        self.types.insert(type_name.into(), Some(constructor));
        self
    }

    /// Adds a type that cannot be constructed without arguments.
    pub fn add_type_without_constructor(&mut self, type_name: impl Into<String>) -> &mut Self {
        self.types.insert(type_name.into(), None);
        self
    }

    /// Records a reference to another module by name.
    pub fn add_reference(&mut self, module_name: impl Into<String>) -> &mut Self {
        self.references.push(module_name.into());
        self
    }

    /// Whether the module defines `type_name`.
    pub fn defines(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    /// Names of the modules this one references.
    pub fn references(&self) -> &[String] {
        &self.references
    }
}

impl fmt::Debug for CatalogModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.types.keys().collect();
        types.sort();
        f.debug_struct("CatalogModule")
            .field("name", &self.name)
            .field("types", &types)
            .field("references", &self.references)
            .finish()
    }
}

#[derive(Debug, Clone)]
struct ModuleEntry {
    module: Arc<CatalogModule>,
    loaded: bool,
}

/// The session's view of loaded code, with a cache of resolved names.
#[derive(Debug)]
pub struct TypeCatalog {
    modules: SnapshotMap<String, ModuleEntry>,
    resolved: SnapshotMap<String, Arc<CatalogModule>>,
}

impl TypeCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self {
            modules: SnapshotMap::new(),
            resolved: SnapshotMap::new(),
        }
    }

    /// Adds a module that lookups start from.
    pub fn add_loaded_module(&self, module: CatalogModule) {
        self.add(module, true);
    }

    /// Adds a module reachable only through another module's references.
    pub fn add_referenced_module(&self, module: CatalogModule) {
        self.add(module, false);
    }

    fn add(&self, module: CatalogModule, loaded: bool) {
        let name = module.name.clone();
        let entry = ModuleEntry {
            module: Arc::new(module),
            loaded,
        };
        let _ = self.modules.update(|modules| {
            modules.insert(name.clone(), entry);
            Ok::<_, GeodeError>(())
        });
        // A new module can make a cached name ambiguous. Resolutions computed
        // against the previous snapshot are refused by `remember`.
        self.resolved.clear();
        tracing::debug!(module = %name, loaded, "added catalog module");
    }

    /// Finds the one module defining `type_name`.
    pub fn resolve(&self, type_name: &str) -> Result<Arc<CatalogModule>> {
        if let Some(module) = self.resolved.get(&type_name.to_string()) {
            return Ok(module);
        }
        let modules = self.modules.load();
        let mut roots: Vec<&String> = modules
            .iter()
            .filter(|(_, entry)| entry.loaded)
            .map(|(name, _)| name)
            .collect();
        roots.sort();

        let mut queue: VecDeque<&str> = roots.into_iter().map(String::as_str).collect();
        let mut visited: HashSet<&str> = queue.iter().copied().collect();
        let mut matches = Vec::new();
        while let Some(name) = queue.pop_front() {
            let Some(entry) = modules.get(name) else {
                continue;
            };
            if entry.module.defines(type_name) {
                matches.push(Arc::clone(&entry.module));
            }
            for reference in &entry.module.references {
                if visited.insert(reference.as_str()) {
                    queue.push_back(reference.as_str());
                }
            }
        }

        match matches.len() {
            0 => {
                tracing::error!(class_name = type_name, "type not found in any loaded module");
                Err(GeodeError::TypeNotFound(type_name.to_string()))
            }
            1 => {
                let module = matches.remove(0);
                self.remember(type_name, &module, &modules);
                tracing::debug!(class_name = type_name, module = module.name(), "resolved catalog type");
                Ok(module)
            }
            _ => {
                let modules: Vec<String> = matches.iter().map(|m| m.name.clone()).collect();
                tracing::error!(class_name = type_name, ?modules, "type defined in several modules");
                Err(GeodeError::AmbiguousType {
                    name: type_name.to_string(),
                    modules,
                })
            }
        }
    }

    /// Caches a resolution unless `searched` is no longer the published
    /// module set.
    fn remember(
        &self,
        type_name: &str,
        module: &Arc<CatalogModule>,
        searched: &Arc<HashMap<String, ModuleEntry>>,
    ) -> bool {
        let cached = self.resolved.update(|resolved| {
            if !Arc::ptr_eq(&self.modules.load(), searched) {
                return Ok::<_, GeodeError>(false);
            }
            resolved.insert(type_name.to_string(), Arc::clone(module));
            Ok(true)
        });
        matches!(cached, Ok(true))
    }

    /// Constructs a blank instance of `type_name`.
    pub fn create_object(&self, type_name: &str) -> Result<CatalogObject> {
        let module = self.resolve(type_name)?;
        match module.types.get(type_name) {
            Some(Some(constructor)) => Ok(constructor()),
            _ => {
                tracing::error!(class_name = type_name, module = module.name(), "type has no zero-argument constructor");
                Err(GeodeError::MissingConstructor(type_name.to_string()))
            }
        }
    }

    /// Creates an array of `len` null elements typed as `type_name`.
    pub fn get_array_object(&self, type_name: &str, len: usize) -> Result<ObjectArray> {
        self.resolve(type_name)?;
        Ok(ObjectArray {
            class_name: type_name.to_string(),
            items: vec![None; len],
        })
    }

    /// Number of known modules, loaded or referenced.
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Forgets every module and cached resolution.
    pub fn clear(&self) {
        self.modules.clear();
        self.resolved.clear();
    }
}

impl Default for TypeCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::pdx::{PdxReader, PdxWriter};

    #[derive(Debug, Default)]
    struct Invoice;

    impl PdxSerializable for Invoice {
        fn class_name(&self) -> &str {
            "com.example.Invoice"
        }

        fn to_data(&self, _: &mut PdxWriter) -> Result<()> {
            Ok(())
        }

        fn from_data(&mut self, _: &mut PdxReader) -> Result<()> {
            Ok(())
        }
    }

    fn invoice_module(name: &str) -> CatalogModule {
        let mut module = CatalogModule::new(name);
        module.add_pdx_type("com.example.Invoice", || Box::new(Invoice));
        module
    }

    #[test]
    fn test_create_from_loaded_module() {
        let catalog = TypeCatalog::new();
        catalog.add_loaded_module(invoice_module("billing"));
        match catalog.create_object("com.example.Invoice").unwrap() {
            CatalogObject::Pdx(object) => assert_eq!(object.class_name(), "com.example.Invoice"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(catalog.resolve("com.example.Invoice").unwrap().name(), "billing");
    }

    #[test]
    fn test_search_follows_references() {
        let catalog = TypeCatalog::new();
        let mut app = CatalogModule::new("app");
        app.add_reference("billing");
        catalog.add_loaded_module(app);
        catalog.add_referenced_module(invoice_module("billing"));
        assert_eq!(catalog.resolve("com.example.Invoice").unwrap().name(), "billing");
    }

    #[test]
    fn test_unreferenced_module_is_not_searched() {
        let catalog = TypeCatalog::new();
        catalog.add_referenced_module(invoice_module("billing"));
        let err = catalog.create_object("com.example.Invoice").unwrap_err();
        assert!(matches!(err, GeodeError::TypeNotFound(_)));
        assert!(err.is_reflection());
    }

    #[test]
    fn test_ambiguous_name() {
        let catalog = TypeCatalog::new();
        catalog.add_loaded_module(invoice_module("billing"));
        catalog.add_loaded_module(invoice_module("legacy"));
        match catalog.resolve("com.example.Invoice").unwrap_err() {
            GeodeError::AmbiguousType { modules, .. } => assert_eq!(modules, ["billing", "legacy"]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_resolution_against_replaced_modules_is_not_cached() {
        let catalog = TypeCatalog::new();
        catalog.add_loaded_module(invoice_module("billing"));
        let searched = catalog.modules.load();
        let billing = catalog.resolve("com.example.Invoice").unwrap();
        catalog.resolved.clear();

        catalog.add_loaded_module(invoice_module("legacy"));
        assert!(!catalog.remember("com.example.Invoice", &billing, &searched));
        assert!(catalog.resolved.get(&"com.example.Invoice".to_string()).is_none());
        assert!(matches!(
            catalog.resolve("com.example.Invoice").unwrap_err(),
            GeodeError::AmbiguousType { .. }
        ));
        assert!(catalog.remember("com.example.Invoice", &billing, &catalog.modules.load()));
    }

    #[test]
    fn test_cycles_visit_each_module_once() {
        let catalog = TypeCatalog::new();
        let mut a = CatalogModule::new("a");
        a.add_reference("b");
        let mut b = invoice_module("b");
        b.add_reference("a");
        catalog.add_loaded_module(a);
        catalog.add_loaded_module(b);
        assert_eq!(catalog.resolve("com.example.Invoice").unwrap().name(), "b");
    }

    #[test]
    fn test_missing_constructor_raised_at_first_use() {
        let catalog = TypeCatalog::new();
        let mut module = CatalogModule::new("billing");
        module.add_type_without_constructor("com.example.Ledger");
        catalog.add_loaded_module(module);
        let err = catalog.create_object("com.example.Ledger").unwrap_err();
        assert!(matches!(err, GeodeError::MissingConstructor(_)));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_array_object() {
        let catalog = TypeCatalog::new();
        catalog.add_loaded_module(invoice_module("billing"));
        let array = catalog.get_array_object("com.example.Invoice", 3).unwrap();
        assert_eq!(array.class_name, "com.example.Invoice");
        assert_eq!(array.items.len(), 3);
        assert!(catalog.get_array_object("com.example.Missing", 1).is_err());
    }
}

//! Read-only field view of a PDX record.

use std::sync::Arc;

use super::{PdxReader, PdxType, PdxWriter};
use crate::serialization::hashing::hash_ordered;
use crate::serialization::value::CacheableValue;

/// A PDX record kept as its type and field values.
///
/// Produced instead of the application object when the registry reads
/// serialized, or when nothing can construct the class. Writing an instance
/// reproduces the record it was read from.
///
/// Two instances are equal when their class names and identity fields match;
/// with no identity field marked, every field counts.
#[derive(Debug, Clone)]
pub struct PdxInstance {
    pdx_type: Arc<PdxType>,
    values: Arc<[Option<CacheableValue>]>,
}

impl PdxInstance {
    pub(crate) fn new(pdx_type: Arc<PdxType>, values: Vec<Option<CacheableValue>>) -> Self {
        Self {
            pdx_type,
            values: values.into(),
        }
    }

    /// Builds an unnumbered instance from a finished writer.
    pub fn from_writer(writer: PdxWriter) -> Self {
        let (class_name, fields, values) = writer.into_parts();
        Self::new(Arc::new(PdxType::new(class_name, fields)), values)
    }

    /// The class name recorded in the type.
    pub fn class_name(&self) -> &str {
        self.pdx_type.class_name()
    }

    /// The type describing this record.
    pub fn pdx_type(&self) -> &Arc<PdxType> {
        &self.pdx_type
    }

    /// Field names in record order.
    pub fn field_names(&self) -> Vec<&str> {
        self.pdx_type.fields().iter().map(|f| f.name()).collect()
    }

    /// Whether the type declares `name`.
    pub fn has_field(&self, name: &str) -> bool {
        self.pdx_type.has_field(name)
    }

    /// Returns the field's value; `None` when absent or null.
    pub fn get_field(&self, name: &str) -> Option<&CacheableValue> {
        let field = self.pdx_type.field(name)?;
        self.values[field.index()].as_ref()
    }

    /// Whether `name` takes part in equality and hashing.
    pub fn is_identity_field(&self, name: &str) -> bool {
        self.pdx_type.field(name).map_or(false, |f| f.is_identity())
    }

    /// A reader over this instance's fields.
    pub fn reader(&self) -> PdxReader {
        PdxReader::new(Arc::clone(&self.pdx_type), Arc::clone(&self.values))
    }

    /// A reader that takes over this instance's fields.
    pub(crate) fn into_reader(self) -> PdxReader {
        PdxReader::new(self.pdx_type, self.values)
    }

    pub(crate) fn values(&self) -> &[Option<CacheableValue>] {
        &self.values
    }

    fn identity_values(&self) -> Vec<(&str, Option<&CacheableValue>)> {
        let fields = self.pdx_type.fields();
        let marked = fields.iter().any(|f| f.is_identity());
        fields
            .iter()
            .filter(|f| !marked || f.is_identity())
            .map(|f| (f.name(), self.values[f.index()].as_ref()))
            .collect()
    }

    /// Java-compatible hash over the identity fields.
    pub fn hash_code(&self) -> i32 {
        hash_ordered(
            self.identity_values()
                .into_iter()
                .map(|(_, v)| v.map_or(0, CacheableValue::hash_code)),
        )
    }
}

impl PartialEq for PdxInstance {
    fn eq(&self, other: &Self) -> bool {
        self.class_name() == other.class_name() && self.identity_values() == other.identity_values()
    }
}

#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;

use geode_core::serialization::{PdxReader, PdxSerializable, PdxValue, PdxWriter};
use geode_core::{CacheableValue, Result, TypeRegistry};

#[derive(Debug, Default)]
struct FuzzRecord {
    flag: bool,
    count: i32,
    total: i64,
    ratio: f64,
    label: Option<String>,
    codes: Option<Vec<i32>>,
    nested: Option<CacheableValue>,
}

impl PdxSerializable for FuzzRecord {
    fn class_name(&self) -> &str {
        "fuzz.Record"
    }

    fn to_data(&self, writer: &mut PdxWriter) -> Result<()> {
        writer.write_boolean("flag", self.flag)?;
        writer.write_int("count", self.count)?;
        writer.write_long("total", self.total)?;
        writer.write_double("ratio", self.ratio)?;
        writer.write_string("label", self.label.as_deref())?;
        writer.write_int_array("codes", self.codes.as_deref())?;
        writer.write_object("nested", self.nested.clone())?;
        writer.mark_identity_field("count")
    }

    fn from_data(&mut self, reader: &mut PdxReader) -> Result<()> {
        self.flag = reader.read_boolean("flag")?;
        self.count = reader.read_int("count")?;
        self.total = reader.read_long("total")?;
        self.ratio = reader.read_double("ratio")?;
        self.label = reader.read_string("label")?;
        self.codes = reader.read_int_array("codes")?;
        self.nested = reader.read_object("nested")?;
        Ok(())
    }
}

fn session() -> (Arc<TypeRegistry>, [u8; 4]) {
    let registry = Arc::new(TypeRegistry::with_builtins());
    let _ = registry.register_pdx_type(FuzzRecord::default);
    let sample = CacheableValue::Pdx(PdxValue::Object(Arc::new(FuzzRecord::default())));
    let type_id = registry
        .serialize(&sample)
        .map(|bytes| [bytes[5], bytes[6], bytes[7], bytes[8]])
        .unwrap_or_default();
    (registry, type_id)
}

fuzz_target!(|data: &[u8]| {
    let (registry, type_id) = session();

    // PDX header for the known type, then arbitrary field data.
    let mut record = vec![93];
    record.extend_from_slice(&(data.len() as i32).to_be_bytes());
    record.extend_from_slice(&type_id);
    record.extend_from_slice(data);

    let _ = registry.deserialize(&record);

    registry.set_read_serialized(true);
    if let Ok(Some(CacheableValue::Pdx(PdxValue::Instance(instance)))) = registry.deserialize(&record) {
        let _ = instance.hash_code();
        let mut reader = instance.reader();
        let _ = reader.read_string("label");
        let _ = reader.read_object("nested");
        let _ = registry.serialize(&CacheableValue::Pdx(PdxValue::Instance(instance)));
    }

    // Raw bytes with no framing at all.
    let _ = registry.deserialize(data);
});

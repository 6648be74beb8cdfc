//! Derive macros for Geode serialization.
//!
//! - [`DataSerializable`] implements the class-ID based user type format.
//! - [`PdxSerializable`] implements the field-named PDX format.
//!
//! Both also implement `IntoCacheable` and `FromCacheable`, so derived types
//! pass through the typed session entry points directly.
//!
//! # Example
//!
//! ```ignore
//! use geode_core::PdxSerializable;
//!
//! #[derive(Debug, Default, PdxSerializable)]
//! #[geode(class_name = "com.example.Order")]
//! struct Order {
//!     #[geode(identity)]
//!     id: i64,
//!     #[geode(field_name = "itemName")]
//!     item: Option<String>,
//! }
//! ```

extern crate proc_macro;

mod attrs;
mod cacheable;
mod data_serializable;
mod pdx;

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

/// Derives `DataSerializable` for a struct with named fields.
///
/// # Attributes
///
/// ## Struct-level
/// - `#[geode(class_id = N)]`: **required**. The non-negative user class ID.
///
/// ## Field-level
/// - `#[geode(skip)]`: not serialized; reset to `Default::default()` on read.
///
/// Fields of type `bool`, `i8`, `i16`, `u16`, `i32`, `i64`, `f32`, `f64`,
/// `String`, `Option<String>` and `Vec<u8>` are written raw. Any other field
/// is written as a typed object and must implement `Clone`, `IntoCacheable`
/// and `FromCacheable`.
#[proc_macro_derive(DataSerializable, attributes(geode))]
pub fn derive_data_serializable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    data_serializable::derive_data_serializable_impl(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Derives `PdxSerializable` for a struct with named fields.
///
/// # Attributes
///
/// ## Struct-level
/// - `#[geode(class_name = "...")]`: the local class name (defaults to the
///   struct name).
///
/// ## Field-level
/// - `#[geode(field_name = "...")]`: overrides the PDX field name.
/// - `#[geode(identity)]`: marks the field as an identity field.
/// - `#[geode(skip)]`: not serialized; reset to `Default::default()` on read.
///
/// Fields missing from a record read as their default.
#[proc_macro_derive(PdxSerializable, attributes(geode))]
pub fn derive_pdx_serializable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    pdx::derive_pdx_impl(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

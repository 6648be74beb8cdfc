//! Derive macro implementation for `PdxSerializable`.

use proc_macro2::TokenStream;
use quote::quote;
use syn::DeriveInput;

use crate::attrs::{has_flag, inner_type, named_fields, parse_str_attr, type_to_string};
use crate::cacheable::conversions;

/// PDX writer/reader method suffix for scalar field types.
fn scalar_method(ty: &str) -> Option<&'static str> {
    Some(match ty {
        "bool" => "boolean",
        "i8" => "byte",
        "u16" => "char",
        "i16" => "short",
        "i32" => "int",
        "i64" => "long",
        "f32" => "float",
        "f64" => "double",
        _ => return None,
    })
}

fn is_date(ty: &str) -> bool {
    matches!(ty, "DateTime<Utc>" | "chrono::DateTime<chrono::Utc>")
}

fn field_stmts(ident: &syn::Ident, ty: &str, wire_name: &str) -> (TokenStream, TokenStream) {
    if let Some(method) = scalar_method(ty) {
        let write = quote::format_ident!("write_{}", method);
        let read = quote::format_ident!("read_{}", method);
        return (
            quote! { writer.#write(#wire_name, self.#ident)?; },
            quote! { reader.#read(#wire_name)? },
        );
    }
    if ty == "String" {
        return (
            quote! { writer.write_string(#wire_name, Some(self.#ident.as_str()))?; },
            quote! { reader.read_string(#wire_name)?.unwrap_or_default() },
        );
    }
    if is_date(ty) {
        return (
            quote! { writer.write_date(#wire_name, Some(self.#ident))?; },
            quote! { reader.read_date(#wire_name)?.unwrap_or_default() },
        );
    }
    if let Some(inner) = inner_type(ty, "Option") {
        if inner == "String" {
            return (
                quote! { writer.write_string(#wire_name, self.#ident.as_deref())?; },
                quote! { reader.read_string(#wire_name)? },
            );
        }
        if is_date(inner) {
            return (
                quote! { writer.write_date(#wire_name, self.#ident)?; },
                quote! { reader.read_date(#wire_name)? },
            );
        }
    }
    if let Some(inner) = inner_type(ty, "Vec") {
        let array = match inner {
            "u8" => Some("byte"),
            "i8" => None,
            "String" => {
                return (
                    quote! {
                        let items: Vec<Option<String>> = self.#ident.iter().cloned().map(Some).collect();
                        writer.write_string_array(#wire_name, Some(items.as_slice()))?;
                    },
                    quote! {
                        reader
                            .read_string_array(#wire_name)?
                            .unwrap_or_default()
                            .into_iter()
                            .map(Option::unwrap_or_default)
                            .collect()
                    },
                )
            }
            other => scalar_method(other),
        };
        if let Some(method) = array {
            let write = quote::format_ident!("write_{}_array", method);
            let read = quote::format_ident!("read_{}_array", method);
            return (
                quote! { writer.#write(#wire_name, Some(self.#ident.as_slice()))?; },
                quote! { reader.#read(#wire_name)?.unwrap_or_default() },
            );
        }
    }
    // Anything else travels as a nested object through the convert traits.
    let read = if inner_type(ty, "Option").is_some() {
        quote! { ::geode_core::serialization::FromCacheable::from_element(reader.read_object(#wire_name)?)? }
    } else {
        quote! {
            match reader.read_object(#wire_name)? {
                Some(value) => ::geode_core::serialization::FromCacheable::from_cacheable(value)?,
                None => Default::default(),
            }
        }
    };
    (
        quote! {
            let value = ::geode_core::serialization::IntoCacheable::into_element(
                ::std::clone::Clone::clone(&self.#ident),
            )?;
            writer.write_object(#wire_name, value)?;
        },
        read,
    )
}

pub fn derive_pdx_impl(input: DeriveInput) -> syn::Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let class_name = parse_str_attr(&input.attrs, "class_name")?.unwrap_or_else(|| name.to_string());

    let mut write_stmts = Vec::new();
    let mut identity_stmts = Vec::new();
    let mut read_stmts = Vec::new();

    for field in named_fields(&input, "PdxSerializable")? {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        if has_flag(&field.attrs, "skip") {
            read_stmts.push(quote! { self.#ident = Default::default(); });
            continue;
        }
        let wire_name = parse_str_attr(&field.attrs, "field_name")?.unwrap_or_else(|| ident.to_string());
        if has_flag(&field.attrs, "identity") {
            identity_stmts.push(quote! { writer.mark_identity_field(#wire_name)?; });
        }

        let (write, read) = field_stmts(ident, &type_to_string(&field.ty), &wire_name);
        write_stmts.push(write);
        read_stmts.push(quote! { self.#ident = #read; });
    }

    let conversions = conversions(
        &input,
        quote! { ::geode_core::CacheableValue::Pdx(::geode_core::serialization::PdxValue::Object(object)) },
    );

    Ok(quote! {
        impl #impl_generics ::geode_core::serialization::PdxSerializable for #name #ty_generics #where_clause {
            fn class_name(&self) -> &str {
                #class_name
            }

            fn to_data(
                &self,
                writer: &mut ::geode_core::serialization::PdxWriter,
            ) -> ::geode_core::Result<()> {
                #(#write_stmts)*
                #(#identity_stmts)*
                Ok(())
            }

            fn from_data(
                &mut self,
                reader: &mut ::geode_core::serialization::PdxReader,
            ) -> ::geode_core::Result<()> {
                #(#read_stmts)*
                Ok(())
            }
        }

        #conversions
    })
}

//! Derive macro implementation for `DataSerializable`.

use proc_macro2::TokenStream;
use quote::quote;
use syn::DeriveInput;

use crate::attrs::{has_flag, inner_type, named_fields, parse_int_attr, type_to_string};
use crate::cacheable::conversions;

pub fn derive_data_serializable_impl(input: DeriveInput) -> syn::Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let class_id = parse_int_attr(&input.attrs, "class_id")?.ok_or_else(|| {
        syn::Error::new_spanned(name, "DataSerializable requires #[geode(class_id = N)]")
    })?;
    if class_id < 0 {
        return Err(syn::Error::new_spanned(name, "class_id must not be negative"));
    }

    let mut write_stmts = Vec::new();
    let mut read_stmts = Vec::new();

    for field in named_fields(&input, "DataSerializable")? {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        if has_flag(&field.attrs, "skip") {
            read_stmts.push(quote! { self.#ident = Default::default(); });
            continue;
        }

        let ty = type_to_string(&field.ty);
        let (write, read) = match ty.as_str() {
            "bool" => (quote! { output.write_bool(self.#ident)?; }, quote! { input.read_bool()? }),
            "i8" => (quote! { output.write_byte(self.#ident)?; }, quote! { input.read_byte()? }),
            "i16" => (quote! { output.write_short(self.#ident)?; }, quote! { input.read_short()? }),
            "u16" => (quote! { output.write_char(self.#ident)?; }, quote! { input.read_char()? }),
            "i32" => (quote! { output.write_int(self.#ident)?; }, quote! { input.read_int()? }),
            "i64" => (quote! { output.write_long(self.#ident)?; }, quote! { input.read_long()? }),
            "f32" => (quote! { output.write_float(self.#ident)?; }, quote! { input.read_float()? }),
            "f64" => (quote! { output.write_double(self.#ident)?; }, quote! { input.read_double()? }),
            "String" => (
                quote! { output.write_string(Some(self.#ident.as_str()))?; },
                quote! { input.read_string()?.unwrap_or_default() },
            ),
            "Vec<u8>" => (
                quote! { output.write_bytes(Some(self.#ident.as_slice()))?; },
                quote! { input.read_bytes()?.unwrap_or_default() },
            ),
            s if inner_type(s, "Option") == Some("String") => (
                quote! { output.write_string(self.#ident.as_deref())?; },
                quote! { input.read_string()? },
            ),
            _ => (
                quote! {
                    let value = ::geode_core::serialization::IntoCacheable::into_element(
                        ::std::clone::Clone::clone(&self.#ident),
                    )?;
                    output.write_object(value.as_ref())?;
                },
                quote! { ::geode_core::serialization::FromCacheable::from_element(input.read_object()?)? },
            ),
        };
        write_stmts.push(write);
        read_stmts.push(quote! { self.#ident = #read; });
    }

    let conversions = conversions(&input, quote! { ::geode_core::CacheableValue::UserData(object) });

    Ok(quote! {
        impl #impl_generics ::geode_core::serialization::DataSerializable for #name #ty_generics #where_clause {
            fn class_id(&self) -> i32 {
                #class_id
            }

            fn to_data(
                &self,
                output: &mut ::geode_core::ObjectDataOutput,
            ) -> ::geode_core::Result<()> {
                #[allow(unused_imports)]
                use ::geode_core::DataOutput as _;
                #(#write_stmts)*
                Ok(())
            }

            fn from_data(
                &mut self,
                input: &mut ::geode_core::ObjectDataInput<'_>,
            ) -> ::geode_core::Result<()> {
                #[allow(unused_imports)]
                use ::geode_core::DataInput as _;
                #(#read_stmts)*
                Ok(())
            }
        }

        #conversions
    })
}

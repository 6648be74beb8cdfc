//! `IntoCacheable`/`FromCacheable` for derived user types.

use proc_macro2::TokenStream;
use quote::quote;
use syn::DeriveInput;

/// Conversions that box `Self` into the value variant built by `wrap`.
pub fn conversions(input: &DeriveInput, wrap: TokenStream) -> TokenStream {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    quote! {
        impl #impl_generics ::geode_core::serialization::IntoCacheable for #name #ty_generics #where_clause {
            fn into_cacheable(self) -> ::geode_core::Result<::geode_core::CacheableValue> {
                let object = ::std::sync::Arc::new(self);
                Ok(#wrap)
            }
        }

        impl #impl_generics ::geode_core::serialization::FromCacheable for #name #ty_generics #where_clause {
            fn from_cacheable(value: ::geode_core::CacheableValue) -> ::geode_core::Result<Self> {
                let object = value.downcast_user::<Self>()?;
                drop(value);
                ::std::sync::Arc::try_unwrap(object).map_err(|_| {
                    ::geode_core::GeodeError::mismatch(
                        ::std::any::type_name::<Self>(),
                        "instance shared with other values",
                    )
                })
            }
        }
    }
}

//! `#[geode(...)]` attribute parsing shared by the derives.

use syn::{Attribute, Data, DeriveInput, Field, Fields, Lit};

/// Named fields of a struct, or an error spanning the input.
pub fn named_fields<'a>(input: &'a DeriveInput, derive: &str) -> syn::Result<Vec<&'a Field>> {
    match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => Ok(fields.named.iter().collect()),
            _ => Err(syn::Error::new_spanned(
                &input.ident,
                format!("{derive} only supports structs with named fields"),
            )),
        },
        _ => Err(syn::Error::new_spanned(
            &input.ident,
            format!("{derive} can only be derived for structs"),
        )),
    }
}

pub fn parse_str_attr(attrs: &[Attribute], key: &str) -> syn::Result<Option<String>> {
    let mut result = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident("geode")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident(key) {
                match meta.value()?.parse()? {
                    Lit::Str(s) => result = Some(s.value()),
                    other => return Err(syn::Error::new_spanned(other, format!("`{key}` expects a string"))),
                }
            } else if meta.input.peek(syn::Token![=]) {
                meta.value()?.parse::<Lit>()?;
            }
            Ok(())
        })?;
    }
    Ok(result)
}

pub fn parse_int_attr(attrs: &[Attribute], key: &str) -> syn::Result<Option<i32>> {
    let mut result = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident("geode")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident(key) {
                match meta.value()?.parse()? {
                    Lit::Int(i) => result = Some(i.base10_parse()?),
                    other => return Err(syn::Error::new_spanned(other, format!("`{key}` expects an integer"))),
                }
            } else if meta.input.peek(syn::Token![=]) {
                meta.value()?.parse::<Lit>()?;
            }
            Ok(())
        })?;
    }
    Ok(result)
}

pub fn has_flag(attrs: &[Attribute], flag: &str) -> bool {
    let mut found = false;
    for attr in attrs.iter().filter(|a| a.path().is_ident("geode")) {
        let _ = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident(flag) {
                found = true;
            } else if meta.input.peek(syn::Token![=]) {
                meta.value()?.parse::<Lit>()?;
            }
            Ok(())
        });
    }
    found
}

pub fn type_to_string(ty: &syn::Type) -> String {
    let ty = quote::quote!(#ty).to_string().replace(' ', "");
    ty.strip_prefix("::").unwrap_or(&ty).to_string()
}

/// `T` from `Option<T>` or `Vec<T>`, spelled the way it was written.
pub fn inner_type<'a>(ty: &'a str, wrapper: &str) -> Option<&'a str> {
    ty.strip_prefix(wrapper)?.strip_prefix('<')?.strip_suffix('>')
}

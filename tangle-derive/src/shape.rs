use proc_macro2::TokenStream;
use quote::quote;
use syn::DeriveInput;

use crate::{FieldAttrs, parse_field_attrs, parse_variant_attrs};

/// A named field together with its parsed attributes.
pub(crate) struct FieldSpec<'a> {
    pub ident: &'a syn::Ident,
    pub key: String,
    pub skip: bool,
}

/// A unit variant together with its wire name.
pub(crate) struct VariantSpec<'a> {
    pub ident: &'a syn::Ident,
    pub name: String,
}

/// Collects the fields of a named-field (or unit) struct in declaration order.
///
/// Fields that are not `pub` are treated as skipped.
pub(crate) fn struct_fields(data: &syn::DataStruct) -> syn::Result<Vec<FieldSpec<'_>>> {
    match &data.fields {
        syn::Fields::Named(named) => named
            .named
            .iter()
            .map(|f| {
                let attrs = parse_field_attrs(&f.attrs)?;
                let ident = f
                    .ident
                    .as_ref()
                    .ok_or_else(|| syn::Error::new_spanned(f, "expected a named field"))?;
                Ok(FieldSpec {
                    ident,
                    key: field_key(ident, &attrs),
                    skip: attrs.skip || !matches!(f.vis, syn::Visibility::Public(_)),
                })
            })
            .collect(),
        syn::Fields::Unit => Ok(Vec::new()),
        syn::Fields::Unnamed(unnamed) => Err(syn::Error::new_spanned(
            unnamed,
            "Mappable cannot be derived for tuple structs",
        )),
    }
}

/// Collects the variants of a unit-only enum.
pub(crate) fn enum_variants(data: &syn::DataEnum) -> syn::Result<Vec<VariantSpec<'_>>> {
    data.variants
        .iter()
        .map(|v| {
            if !matches!(v.fields, syn::Fields::Unit) {
                return Err(syn::Error::new_spanned(
                    v,
                    "Mappable can only be derived for enums whose variants are all unit variants",
                ));
            }
            let attrs = parse_variant_attrs(&v.attrs)?;
            Ok(VariantSpec {
                ident: &v.ident,
                name: attrs.rename.unwrap_or_else(|| v.ident.to_string()),
            })
        })
        .collect()
}

fn field_key(ident: &syn::Ident, attrs: &FieldAttrs) -> String {
    attrs.rename.clone().unwrap_or_else(|| ident.to_string())
}

/// Generates the `SHAPE` constant.
pub(crate) fn generate_shape(input: &DeriveInput) -> syn::Result<TokenStream> {
    let shape = match &input.data {
        syn::Data::Struct(data) => {
            let descs = struct_fields(data)?.into_iter().map(|field| {
                let name = field.ident.to_string();
                let key = &field.key;
                let skip = field.skip;
                quote! {
                    ::tangle_core::FieldDesc { name: #name, key: #key, skip: #skip }
                }
            });
            quote! { ::tangle_core::Shape::Struct(&[#(#descs),*]) }
        }
        syn::Data::Enum(data) => {
            enum_variants(data)?;
            quote! { ::tangle_core::Shape::Scalar(::tangle_core::Kind::String) }
        }
        syn::Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "Mappable cannot be derived for unions",
            ));
        }
    };

    Ok(quote! {
        const SHAPE: ::tangle_core::Shape = #shape;
    })
}

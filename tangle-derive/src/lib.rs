use proc_macro::TokenStream;
use quote::quote;
use syn::{DeriveInput, parse_macro_input};

mod shape;

use shape::{enum_variants, generate_shape, struct_fields};

/// Derive macro for the Mappable trait.
///
/// Supports structs with named fields, which map to struct nodes keyed by
/// field name, and enums whose variants are all unit variants, which map to
/// string nodes holding the variant name.
///
/// # Example
///
/// ```ignore
/// use tangle_core::{Mappable, Shared};
///
/// #[derive(Default, Mappable)]
/// pub struct Person {
///     #[tangle(rename = "Name")]
///     pub name: String,
///     pub friend: Option<Shared<Person>>,
///     #[tangle(skip)]
///     pub visits: u32,
///     notes: String,
/// }
/// ```
///
/// Only `pub` fields are mapped. Any other field behaves as if it carried
/// `#[tangle(skip)]`, so `notes` above is never written.
///
/// # Attributes
///
/// - `#[tangle(skip)]` - Leave this field out of the tree (field must impl Default).
///   Its kind is still checked when serializing.
/// - `#[tangle(rename = "name")]` - Use a custom key for a field or a custom
///   name for an enum variant
///
/// Every non-skipped field type must implement `Mappable` and `Default`; a
/// field missing from the tree is materialized as its default.
#[proc_macro_derive(Mappable, attributes(tangle))]
pub fn derive_mappable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match derive_mappable_impl(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn derive_mappable_impl(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let generics = &input.generics;

    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();
    let where_clause = build_where_clause(generics, where_clause);

    let shape_impl = generate_shape(input)?;
    let (to_node_impl, from_node_impl) = match &input.data {
        syn::Data::Struct(data) => generate_struct_impls(data)?,
        syn::Data::Enum(data) => generate_enum_impls(data)?,
        syn::Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "Mappable cannot be derived for unions",
            ));
        }
    };

    Ok(quote! {
        impl #impl_generics ::tangle_core::Mappable for #name #ty_generics #where_clause {
            #shape_impl

            fn to_node(
                &self,
                session: &mut ::tangle_core::SerializationSession,
            ) -> ::std::result::Result<::tangle_core::Node, ::tangle_core::Error> {
                #to_node_impl
            }

            fn from_node(
                node: ::tangle_core::NodeRef<'_>,
                session: &mut ::tangle_core::MaterializationSession,
            ) -> ::std::result::Result<Self, ::tangle_core::Error> {
                #from_node_impl
            }
        }
    })
}

fn build_where_clause(
    generics: &syn::Generics,
    existing: Option<&syn::WhereClause>,
) -> proc_macro2::TokenStream {
    let type_params: Vec<_> = generics.type_params().map(|p| &p.ident).collect();

    if type_params.is_empty() && existing.is_none() {
        return quote! {};
    }

    let mappable_bounds = type_params.iter().map(|p| {
        quote! { #p: ::tangle_core::Mappable }
    });

    let existing_predicates = existing
        .map(|w| {
            let predicates = &w.predicates;
            quote! { #predicates, }
        })
        .unwrap_or_default();

    quote! {
        where
            #existing_predicates
            #(#mappable_bounds),*
    }
}

/// Fields are written in declaration order. Skipped fields are only
/// kind-checked and come back as their default.
fn generate_struct_impls(
    data: &syn::DataStruct,
) -> syn::Result<(proc_macro2::TokenStream, proc_macro2::TokenStream)> {
    let fields = struct_fields(data)?;

    let writes = fields.iter().map(|field| {
        let ident = field.ident;
        let key = &field.key;
        if field.skip {
            quote! { writer.skip(&self.#ident)?; }
        } else {
            quote! { writer.field(#key, &self.#ident, session)?; }
        }
    });

    let reads = fields.iter().map(|field| {
        let ident = field.ident;
        let key = &field.key;
        if field.skip {
            quote! { #ident: ::std::default::Default::default() }
        } else {
            quote! { #ident: reader.field(#key, session)? }
        }
    });

    let construction = match &data.fields {
        syn::Fields::Unit => quote! { { let _ = reader; Self } },
        _ => quote! { Self { #(#reads),* } },
    };

    let to_node = quote! {
        let mut writer = ::tangle_core::StructWriter::new(session);
        #(#writes)*
        ::std::result::Result::Ok(writer.finish())
    };

    let from_node = quote! {
        let reader = ::tangle_core::StructReader::open(
            node,
            &<Self as ::tangle_core::Mappable>::SHAPE,
        )?;
        let _ = &session;
        ::std::result::Result::Ok(#construction)
    };

    Ok((to_node, from_node))
}

fn generate_enum_impls(
    data: &syn::DataEnum,
) -> syn::Result<(proc_macro2::TokenStream, proc_macro2::TokenStream)> {
    let variants = enum_variants(data)?;

    let to_arms = variants.iter().map(|v| {
        let ident = v.ident;
        let name = &v.name;
        quote! { Self::#ident => #name }
    });

    let from_arms = variants.iter().map(|v| {
        let ident = v.ident;
        let name = &v.name;
        quote! { #name => ::std::result::Result::Ok(Self::#ident) }
    });

    let to_node = quote! {
        let name: &str = match self {
            #(#to_arms,)*
        };
        ::std::result::Result::Ok(::tangle_core::Node::scalar(session.next_ref_id(), name))
    };

    let from_node = quote! {
        let _ = &session;
        match node.expect_str()? {
            #(#from_arms,)*
            other => ::std::result::Result::Err(::tangle_core::Error::InvalidValue {
                kind: ::tangle_core::Kind::String,
                value: ::std::format!("string({:?})", other),
            }),
        }
    };

    Ok((to_node, from_node))
}

#[derive(Default)]
pub(crate) struct FieldAttrs {
    pub skip: bool,
    pub rename: Option<String>,
}

pub(crate) fn parse_field_attrs(attrs: &[syn::Attribute]) -> syn::Result<FieldAttrs> {
    let mut result = FieldAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("tangle") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                result.skip = true;
            } else if meta.path.is_ident("rename") {
                let value: syn::LitStr = meta.value()?.parse()?;
                result.rename = Some(value.value());
            } else {
                return Err(meta.error("unsupported tangle attribute"));
            }
            Ok(())
        })?;
    }

    Ok(result)
}

#[derive(Default)]
pub(crate) struct VariantAttrs {
    pub rename: Option<String>,
}

pub(crate) fn parse_variant_attrs(attrs: &[syn::Attribute]) -> syn::Result<VariantAttrs> {
    let mut result = VariantAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("tangle") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let value: syn::LitStr = meta.value()?.parse()?;
                result.rename = Some(value.value());
            } else {
                return Err(meta.error("unsupported tangle attribute on enum variant"));
            }
            Ok(())
        })?;
    }

    Ok(result)
}

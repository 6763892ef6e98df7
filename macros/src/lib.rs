//! Derive macros for NomadHub resources
//!
//! Every NomadHub resource needs the same boilerplate: a partial "patch"
//! type for optimistic actions, field-by-field JSON parsing, required-field
//! metadata and content equality for reconciliation. This crate generates
//! all of it from the record struct.
//!
//! # Available Macros
//!
//! - `#[derive(Resource)]` - Implements `nomadhub_core::resource::Resource`
//!   and generates a `{Name}Patch` type implementing `Patch`
//!
//! # Example
//!
//! ```ignore
//! use nomadhub_macros::Resource;
//!
//! #[derive(Resource, Clone, Debug, PartialEq, Serialize, Deserialize)]
//! #[resource(plural = "hubs", owner = "user_id", parent = Region, foreign_key = "region_id")]
//! pub struct Hub {
//!     pub id: String,
//!     pub name: String,
//!     pub region_id: String,
//!     pub description: Option<String>,
//!     pub user_id: String,
//! }
//!
//! assert_eq!(Hub::REQUIRED, &["name", "region_id"]);
//! assert_eq!(Hub::GENERATED, &["user_id"]);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::{
    parse_macro_input, Attribute, Data, DeriveInput, Fields, GenericArgument, Ident, LitStr, Path,
    PathArguments, Type,
};

/// Derive macro for resource records
///
/// Generates:
/// - a `{Name}Patch` struct with every field wrapped in `Option`
/// - `impl Patch<Name> for {Name}Patch`
/// - `impl Resource for Name`
///
/// A field is **required** unless it is `id`, an `Option<_>`, marked
/// `#[resource(default)]`, or server-managed. Server-managed fields are the
/// owner column and any field marked `#[resource(generated)]`; they are never
/// read from input and never compared during reconciliation.
///
/// # Attributes
///
/// Container, `#[resource(...)]`:
/// - `plural = "hubs"` - list key and route segment (required)
/// - `singular = "hub"` - by-id key (default: snake-cased type name)
/// - `table = "hubs"` - backing table (default: `plural`)
/// - `owner = "user_id"` - ownership column; omitted means shared
/// - `parent = Region` - joined parent resource
/// - `foreign_key = "region_id"` - join column (required with `parent`)
/// - `parent_field = "region"` - rendered field name (default: `foreign_key`
///   without its `_id` suffix)
///
/// Field, `#[resource(...)]`:
/// - `generated` - server-managed
/// - `default` - optional on input, defaults when absent
///
/// # Panics
///
/// This macro will produce a compile error (not a runtime panic) if:
/// - Applied to anything but a struct with named fields
/// - Applied to a generic struct
/// - The struct has no `id` field, or `plural` is missing
/// - `owner` or `foreign_key` names a field that does not exist
///
/// Every field type must implement `Default`, `Clone`, `PartialEq` and serde's
/// traits.
#[proc_macro_derive(Resource, attributes(resource))]
pub fn derive_resource(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_resource(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

#[derive(Default)]
struct ContainerArgs {
    plural: Option<String>,
    singular: Option<String>,
    table: Option<String>,
    owner: Option<String>,
    parent: Option<Path>,
    foreign_key: Option<String>,
    parent_field: Option<String>,
}

struct FieldInfo {
    ident: Ident,
    name: String,
    ty: Type,
    optional: bool,
    generated: bool,
    defaulted: bool,
}

impl FieldInfo {
    fn is_id(&self) -> bool {
        self.name == "id"
    }

    fn is_required(&self) -> bool {
        !self.is_id() && !self.optional && !self.defaulted && !self.generated
    }

    fn is_content(&self) -> bool {
        !self.is_id() && !self.generated
    }
}

#[allow(clippy::too_many_lines)]
fn expand_resource(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let vis = &input.vis;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "#[derive(Resource)] does not support generic structs",
        ));
    }

    let Data::Struct(data_struct) = &input.data else {
        return Err(syn::Error::new_spanned(
            input,
            "#[derive(Resource)] can only be used on structs",
        ));
    };
    let Fields::Named(named) = &data_struct.fields else {
        return Err(syn::Error::new_spanned(
            input,
            "#[derive(Resource)] requires named fields",
        ));
    };

    let args = parse_container_args(&input.attrs)?;
    let Some(plural) = args.plural.clone() else {
        return Err(syn::Error::new_spanned(
            name,
            "missing #[resource(plural = \"...\")]",
        ));
    };
    let singular = args
        .singular
        .clone()
        .unwrap_or_else(|| to_snake_case(&name.to_string()));
    let table = args.table.clone().unwrap_or_else(|| plural.clone());

    let mut fields = Vec::new();
    for field in &named.named {
        let Some(ident) = field.ident.clone() else {
            return Err(syn::Error::new_spanned(field, "expected a named field"));
        };
        let (generated, defaulted) = parse_field_flags(&field.attrs)?;
        let field_name = ident.unraw().to_string();
        fields.push(FieldInfo {
            generated: generated || args.owner.as_deref() == Some(field_name.as_str()),
            name: field_name,
            optional: option_inner(&field.ty).is_some(),
            ty: field.ty.clone(),
            ident,
            defaulted,
        });
    }

    if !fields.iter().any(FieldInfo::is_id) {
        return Err(syn::Error::new_spanned(
            name,
            "#[derive(Resource)] requires an `id: String` field",
        ));
    }
    if let Some(owner) = &args.owner {
        if !fields.iter().any(|field| &field.name == owner) {
            return Err(syn::Error::new_spanned(
                name,
                format!("owner column `{owner}` is not a field"),
            ));
        }
    }

    let patch_name = format_ident!("{}Patch", name);
    let patch_doc = format!("Partial [`{name}`]: every field optional.");

    // Patch struct
    let patch_fields = fields.iter().map(|field| {
        let ident = &field.ident;
        let ty = &field.ty;
        quote! {
            #[serde(default, skip_serializing_if = "Option::is_none")]
            #vis #ident: ::core::option::Option<#ty>,
        }
    });

    let merge_stmts = fields.iter().map(|field| {
        let ident = &field.ident;
        quote! {
            if let ::core::option::Option::Some(value) = &self.#ident {
                target.#ident.clone_from(value);
            }
        }
    });

    let into_record_fields = fields.iter().map(|field| {
        let ident = &field.ident;
        quote! { #ident: self.#ident.unwrap_or_default(), }
    });

    let from_record_fields = fields.iter().map(|field| {
        let ident = &field.ident;
        quote! { #ident: ::core::option::Option::Some(record.#ident.clone()), }
    });

    let present_stmts = fields.iter().map(|field| {
        let ident = &field.ident;
        let key = &field.name;
        quote! {
            if self.#ident.is_some() {
                fields.push(#key);
            }
        }
    });

    // Field-by-field JSON parsing; server-managed fields are ignored
    let parse_stmts = fields.iter().filter(|field| !field.generated).map(|field| {
        let ident = &field.ident;
        let ty = &field.ty;
        let key = &field.name;
        let on_null = if field.optional {
            quote! { patch.#ident = ::core::option::Option::Some(::core::option::Option::None); }
        } else {
            quote! {}
        };
        quote! {
            match object.get(#key) {
                ::core::option::Option::None => {},
                ::core::option::Option::Some(::serde_json::Value::Null) => { #on_null },
                ::core::option::Option::Some(raw) => {
                    match ::serde_json::from_value::<#ty>(raw.clone()) {
                        ::core::result::Result::Ok(value) => {
                            patch.#ident = ::core::option::Option::Some(value);
                        },
                        ::core::result::Result::Err(error) => {
                            issues.push(#key, format!("Invalid {}: {}", #key, error));
                        },
                    }
                },
            }
        }
    });

    // Resource metadata
    let columns = fields.iter().map(|field| &field.name);
    let required = fields
        .iter()
        .filter(|field| field.is_required())
        .map(|field| &field.name);
    let generated = fields
        .iter()
        .filter(|field| field.generated)
        .map(|field| &field.name);

    let scope = match &args.owner {
        Some(column) => quote! {
            ::nomadhub_core::resource::Scope::Owned { column: #column }
        },
        None => quote! { ::nomadhub_core::resource::Scope::Shared },
    };

    let (parent_ty, join) = expand_join(name, &args, &fields)?;

    let content_fields: Vec<&Ident> = fields
        .iter()
        .filter(|field| field.is_content())
        .map(|field| &field.ident)
        .collect();

    let owner_body = match &args.owner {
        Some(column) => {
            let ident = fields
                .iter()
                .find(|field| &field.name == column)
                .map(|field| &field.ident);
            quote! { ::core::option::Option::Some(self.#ident.as_str()) }
        },
        None => quote! { ::core::option::Option::None },
    };

    let expanded = quote! {
        #[doc = #patch_doc]
        #[derive(Clone, Debug, Default, PartialEq, ::serde::Serialize, ::serde::Deserialize)]
        #vis struct #patch_name {
            #(#patch_fields)*
        }

        impl ::nomadhub_core::resource::Patch<#name> for #patch_name {
            fn id(&self) -> ::core::option::Option<&str> {
                self.id.as_deref()
            }

            fn merge_into(&self, target: &mut #name) {
                #(#merge_stmts)*
            }

            fn into_record(self) -> #name {
                #name {
                    #(#into_record_fields)*
                }
            }

            fn from_record(record: &#name) -> Self {
                Self {
                    #(#from_record_fields)*
                }
            }

            fn present_fields(&self) -> ::std::vec::Vec<&'static str> {
                let mut fields = ::std::vec::Vec::new();
                #(#present_stmts)*
                fields
            }

            fn from_json(
                value: &::serde_json::Value,
            ) -> ::core::result::Result<Self, ::nomadhub_core::schema::ValidationError> {
                let ::core::option::Option::Some(object) = value.as_object() else {
                    return ::core::result::Result::Err(
                        ::nomadhub_core::schema::ValidationError::single("", "Expected an object"),
                    );
                };
                let mut issues = ::nomadhub_core::schema::Issues::default();
                let mut patch = Self::default();
                #(#parse_stmts)*
                issues.into_result()?;
                ::core::result::Result::Ok(patch)
            }
        }

        impl ::nomadhub_core::resource::Resource for #name {
            type Patch = #patch_name;
            type Parent = #parent_ty;

            const PLURAL: &'static str = #plural;
            const SINGULAR: &'static str = #singular;
            const TABLE: &'static str = #table;
            const SCOPE: ::nomadhub_core::resource::Scope = #scope;
            const COLUMNS: &'static [&'static str] = &[#(#columns),*];
            const REQUIRED: &'static [&'static str] = &[#(#required),*];
            const GENERATED: &'static [&'static str] = &[#(#generated),*];
            const JOIN: ::core::option::Option<::nomadhub_core::resource::Join> = #join;

            fn id(&self) -> &str {
                &self.id
            }

            fn set_id(&mut self, id: ::std::string::String) {
                self.id = id;
            }

            fn same_content(&self, other: &Self) -> bool {
                true #(&& self.#content_fields == other.#content_fields)*
            }

            fn owner(&self) -> ::core::option::Option<&str> {
                #owner_body
            }
        }
    };

    Ok(expanded)
}

fn expand_join(
    name: &Ident,
    args: &ContainerArgs,
    fields: &[FieldInfo],
) -> syn::Result<(TokenStream2, TokenStream2)> {
    let Some(parent) = &args.parent else {
        if args.foreign_key.is_some() || args.parent_field.is_some() {
            return Err(syn::Error::new_spanned(
                name,
                "`foreign_key` and `parent_field` require `parent`",
            ));
        }
        return Ok((
            quote! { ::nomadhub_core::resource::NoParent },
            quote! { ::core::option::Option::None },
        ));
    };

    let Some(foreign_key) = &args.foreign_key else {
        return Err(syn::Error::new_spanned(
            parent,
            "`parent` requires `foreign_key = \"...\"`",
        ));
    };
    if !fields.iter().any(|field| &field.name == foreign_key) {
        return Err(syn::Error::new_spanned(
            parent,
            format!("foreign key `{foreign_key}` is not a field"),
        ));
    }
    let field = args.parent_field.clone().unwrap_or_else(|| {
        foreign_key
            .strip_suffix("_id")
            .unwrap_or(foreign_key)
            .to_string()
    });

    Ok((
        quote! { #parent },
        quote! {
            ::core::option::Option::Some(::nomadhub_core::resource::Join {
                table: <#parent as ::nomadhub_core::resource::Resource>::TABLE,
                foreign_key: #foreign_key,
                field: #field,
            })
        },
    ))
}

fn parse_container_args(attrs: &[Attribute]) -> syn::Result<ContainerArgs> {
    let mut args = ContainerArgs::default();
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("resource")) {
        attr.parse_nested_meta(|meta| {
            let slot = if meta.path.is_ident("plural") {
                &mut args.plural
            } else if meta.path.is_ident("singular") {
                &mut args.singular
            } else if meta.path.is_ident("table") {
                &mut args.table
            } else if meta.path.is_ident("owner") {
                &mut args.owner
            } else if meta.path.is_ident("foreign_key") {
                &mut args.foreign_key
            } else if meta.path.is_ident("parent_field") {
                &mut args.parent_field
            } else if meta.path.is_ident("parent") {
                args.parent = Some(meta.value()?.parse::<Path>()?);
                return Ok(());
            } else {
                return Err(meta.error("unsupported resource attribute"));
            };
            *slot = Some(meta.value()?.parse::<LitStr>()?.value());
            Ok(())
        })?;
    }
    Ok(args)
}

fn parse_field_flags(attrs: &[Attribute]) -> syn::Result<(bool, bool)> {
    let mut generated = false;
    let mut defaulted = false;
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("resource")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("generated") {
                generated = true;
                Ok(())
            } else if meta.path.is_ident("default") {
                defaulted = true;
                Ok(())
            } else {
                Err(meta.error("expected `generated` or `default`"))
            }
        })?;
    }
    Ok((generated, defaulted))
}

/// Inner type of `Option<T>`, if `ty` is spelled as an option.
fn option_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != "Option" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

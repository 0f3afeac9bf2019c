// Proc macros operate on named structs where field.ident is always Some
#![allow(clippy::unwrap_used)]

//! # minibatis-derive
//!
//! Procedural macro generating entity field-accessor tables.
//!
//! ## Available Macros
//!
//! - `#[derive(Entity)]` - Implement `minibatis::Entity` for a struct
//!
//! ## Example
//!
//! ```rust,ignore
//! use minibatis::Entity;
//!
//! #[derive(Debug, Default, Entity)]
//! #[minibatis(type_name = "app.pojo.UserPO")]
//! struct User {
//!     id: i64,
//!     name: Option<String>,
//!     // bound as #{oldCar}, filled from column old_car
//!     old_car: Option<String>,
//!     #[minibatis(skip)]
//!     cached_label: String,
//! }
//! ```

#![warn(missing_docs)]

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::ext::IdentExt;
use syn::{Attribute, Data, DeriveInput, Fields, LitStr, parse_macro_input};

/// Field configuration extracted from attributes.
#[derive(Default)]
struct FieldConfig {
    /// Explicit field name.
    rename: Option<String>,
    /// Leave the field out of the table.
    skip: bool,
    /// Keep the current value when the column is NULL.
    default: bool,
}

/// Struct-level configuration extracted from attributes.
#[derive(Default)]
struct StructConfig {
    /// Name mapping entries declare as their result type.
    type_name: Option<String>,
    /// Naming convention applied to every field.
    rename_all: Option<LitStr>,
}

fn parse_field_config(attrs: &[Attribute]) -> syn::Result<FieldConfig> {
    let mut config = FieldConfig::default();

    for attr in attrs {
        if !attr.path().is_ident("minibatis") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let lit: LitStr = meta.value()?.parse()?;
                config.rename = Some(lit.value());
            } else if meta.path.is_ident("skip") {
                config.skip = true;
            } else if meta.path.is_ident("default") {
                config.default = true;
            } else {
                return Err(meta.error("expected `rename`, `skip` or `default`"));
            }
            Ok(())
        })?;
    }

    Ok(config)
}

fn parse_struct_config(attrs: &[Attribute]) -> syn::Result<StructConfig> {
    let mut config = StructConfig::default();

    for attr in attrs {
        if !attr.path().is_ident("minibatis") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("type_name") {
                let lit: LitStr = meta.value()?.parse()?;
                config.type_name = Some(lit.value());
            } else if meta.path.is_ident("rename_all") {
                let lit: LitStr = meta.value()?.parse()?;
                if !RENAME_RULES.contains(&lit.value().as_str()) {
                    return Err(syn::Error::new_spanned(
                        &lit,
                        format!("unknown rename_all rule; expected one of {RENAME_RULES:?}"),
                    ));
                }
                config.rename_all = Some(lit);
            } else {
                return Err(meta.error("expected `type_name` or `rename_all`"));
            }
            Ok(())
        })?;
    }

    Ok(config)
}

const RENAME_RULES: &[&str] = &[
    "camelCase",
    "snake_case",
    "PascalCase",
    "SCREAMING_SNAKE_CASE",
    "none",
];

/// Convert a Rust field name to an entity field name.
///
/// Without a rule the field becomes camelCase, matching the column
/// conversion done when mapping results.
fn apply_rename_all(name: &str, rename_all: Option<&str>) -> String {
    match rename_all {
        Some("snake_case") => to_snake_case(name),
        Some("PascalCase") => to_pascal_case(name),
        Some("SCREAMING_SNAKE_CASE") => to_screaming_snake_case(name),
        Some("none") => name.to_string(),
        _ => to_camel_case(name),
    }
}

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.extend(c.to_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

fn to_camel_case(s: &str) -> String {
    let mut result = String::new();
    let mut capitalize_next = false;
    for (i, c) in s.chars().enumerate() {
        if c == '_' {
            capitalize_next = i > 0;
        } else if capitalize_next {
            result.extend(c.to_uppercase());
            capitalize_next = false;
        } else if i == 0 {
            result.extend(c.to_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

fn to_pascal_case(s: &str) -> String {
    let mut result = String::new();
    let mut capitalize_next = true;
    for c in s.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            result.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            result.push(c);
        }
    }
    result
}

fn to_screaming_snake_case(s: &str) -> String {
    to_snake_case(s).to_uppercase()
}

/// Derive macro for implementing the `Entity` trait.
///
/// Generates a field table with one getter/setter pair per field. Getters
/// use the field's `ToSql` impl and setters its `FromSql` impl, so every
/// mapped field type must implement both.
///
/// ## Attributes
///
/// ### Field Attributes
///
/// - `#[minibatis(rename = "fieldName")]` - Use a different field name
/// - `#[minibatis(skip)]` - Leave the field out of the table
/// - `#[minibatis(default)]` - A NULL column leaves the field at its current value
///
/// ### Struct Attributes
///
/// - `#[minibatis(type_name = "app.pojo.UserPO")]` - Name mapping entries use
///   as result type; defaults to the struct name
/// - `#[minibatis(rename_all = "snake_case")]` - Naming convention for all
///   fields (`camelCase` by default; `none` keeps Rust names)
///
/// ## Example
///
/// ```rust,ignore
/// #[derive(Default, Entity)]
/// #[minibatis(type_name = "app.pojo.CarPO")]
/// struct Car {
///     id: i64,
///     #[minibatis(rename = "plate")]
///     plate_number: String,
///     #[minibatis(default)]
///     seats: i32,
/// }
/// ```
#[proc_macro_derive(Entity, attributes(minibatis))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match impl_entity(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn impl_entity(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let generics = &input.generics;
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let struct_config = parse_struct_config(&input.attrs)?;
    let rename_all = struct_config.rename_all.as_ref().map(LitStr::value);
    let type_name = struct_config
        .type_name
        .unwrap_or_else(|| name.unraw().to_string());

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Entity can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Entity can only be derived for structs",
            ));
        }
    };

    let mut accessors = Vec::new();

    for field in fields {
        let field_ident = field.ident.as_ref().unwrap();
        let config = parse_field_config(&field.attrs)?;

        if config.skip {
            continue;
        }

        let field_name = config.rename.unwrap_or_else(|| {
            apply_rename_all(&field_ident.unraw().to_string(), rename_all.as_deref())
        });

        let assign = if config.default {
            quote! {
                if !value.is_null() {
                    entity.#field_ident = ::minibatis::FromSql::from_sql(value)?;
                }
            }
        } else {
            quote! {
                entity.#field_ident = ::minibatis::FromSql::from_sql(value)?;
            }
        };

        accessors.push(quote! {
            .field(
                #field_name,
                |entity: &Self| ::minibatis::ToSql::to_sql(&entity.#field_ident),
                |entity: &mut Self, value: &::minibatis::SqlValue| {
                    #assign
                    ::std::result::Result::Ok(())
                },
            )
        });
    }

    Ok(quote! {
        impl #impl_generics ::minibatis::Entity for #name #ty_generics #where_clause {
            const TYPE_NAME: &'static str = #type_name;

            fn describe() -> ::minibatis::FieldTable<Self> {
                ::minibatis::FieldTable::<Self>::new()
                    #(#accessors)*
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("userName"), "user_name");
        assert_eq!(to_snake_case("UserName"), "user_name");
        assert_eq!(to_snake_case("user_name"), "user_name");
    }

    #[test]
    fn test_to_camel_case() {
        assert_eq!(to_camel_case("old_car"), "oldCar");
        assert_eq!(to_camel_case("id"), "id");
        assert_eq!(to_camel_case("UserName"), "userName");
        assert_eq!(to_camel_case("_private"), "private");
    }

    #[test]
    fn test_to_pascal_case() {
        assert_eq!(to_pascal_case("user_name"), "UserName");
        assert_eq!(to_pascal_case("userName"), "UserName");
    }

    #[test]
    fn test_to_screaming_snake_case() {
        assert_eq!(to_screaming_snake_case("userName"), "USER_NAME");
        assert_eq!(to_screaming_snake_case("user_name"), "USER_NAME");
    }

    #[test]
    fn test_default_rule_is_camel_case() {
        assert_eq!(apply_rename_all("old_car", None), "oldCar");
        assert_eq!(apply_rename_all("old_car", Some("none")), "old_car");
        assert_eq!(apply_rename_all("oldCar", Some("snake_case")), "old_car");
    }
}

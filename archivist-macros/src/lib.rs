//! Proc macros for archivist retrieval tools.
//!
//! Provides `#[derive(Tool)]`, which turns a documented argument struct into
//! a tool name, a description and a JSON input schema that the completion
//! engine can call.
//!
//! # Example
//!
//! ```ignore
//! /// Retrieve every event of one session in chronological order.
//! #[derive(Tool, Deserialize)]
//! #[tool(name = "get_session_timeline")]
//! struct GetSessionTimeline {
//!     /// Session number (1, 2, 3, ...)
//!     #[tool(minimum = 1)]
//!     session_number: u32,
//! }
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse_macro_input, Attribute, DeriveInput, Expr, Field, Fields, Lit, LitInt, LitStr, Meta,
    Type,
};

/// Derive macro for generating tool definitions.
///
/// # Attributes
///
/// - `#[tool(name = "...")]` on the struct - tool name (defaults to snake_case struct name)
/// - `#[tool(minimum = N)]` on integer fields - lower bound in the JSON schema
///
/// `Option<T>` fields are left out of `required`. Unit structs and structs
/// without fields produce an empty object schema.
#[proc_macro_derive(Tool, attributes(tool))]
pub fn derive_tool(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_tool(input)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}

fn expand_tool(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let tool_name = tool_name(&input)?;
    let description = doc_comment(&input.attrs);

    if description.is_empty() {
        return Err(syn::Error::new_spanned(
            struct_name,
            "Tool derive requires a doc comment: it becomes the tool description",
        ));
    }

    let fields: Vec<&Field> = match &input.data {
        syn::Data::Struct(data) => match &data.fields {
            Fields::Named(named) => named.named.iter().collect(),
            Fields::Unit => Vec::new(),
            Fields::Unnamed(_) => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Tool derive does not support tuple structs",
                ))
            }
        },
        _ => return Err(syn::Error::new_spanned(&input, "Tool derive only supports structs")),
    };

    let mut property_tokens = Vec::new();
    let mut required_fields = Vec::new();

    for field in fields {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let field_name = ident.to_string();
        let field_desc = doc_comment(&field.attrs);
        let minimum = field_minimum(field)?;
        let type_schema = type_to_schema(&field.ty);

        let desc_token = if field_desc.is_empty() {
            quote! {}
        } else {
            quote! { property["description"] = serde_json::json!(#field_desc); }
        };

        let minimum_token = match minimum {
            Some(min) => quote! { property["minimum"] = serde_json::json!(#min); },
            None => quote! {},
        };

        property_tokens.push(quote! {
            {
                let mut property = #type_schema;
                #desc_token
                #minimum_token
                properties.insert(#field_name.to_string(), property);
            }
        });

        if !is_option_type(&field.ty) {
            required_fields.push(field_name);
        }
    }

    Ok(quote! {
        impl #struct_name {
            /// Name the completion engine uses to call this tool.
            pub const NAME: &'static str = #tool_name;

            /// Get the tool name.
            pub fn tool_name() -> &'static str {
                Self::NAME
            }

            /// Get the tool description.
            pub fn tool_description() -> &'static str {
                #description
            }

            /// Generate the JSON schema for this tool's input.
            pub fn input_schema() -> serde_json::Value {
                #[allow(unused_mut)]
                let mut properties = serde_json::Map::new();
                #(#property_tokens)*

                let required: Vec<&str> = vec![#(#required_fields),*];

                serde_json::json!({
                    "type": "object",
                    "properties": properties,
                    "required": required
                })
            }

            /// Create a Tool definition for use with the Claude API.
            pub fn as_tool() -> claude::Tool {
                claude::Tool {
                    name: Self::tool_name().to_string(),
                    description: Self::tool_description().to_string(),
                    input_schema: Self::input_schema(),
                }
            }
        }
    })
}

fn tool_name(input: &DeriveInput) -> syn::Result<String> {
    let mut name = None;
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("tool")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let value: LitStr = meta.value()?.parse()?;
                name = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("expected `name = \"...\"`"))
            }
        })?;
    }
    Ok(name.unwrap_or_else(|| to_snake_case(&input.ident.to_string())))
}

fn field_minimum(field: &Field) -> syn::Result<Option<i64>> {
    let mut minimum = None;
    for attr in field.attrs.iter().filter(|a| a.path().is_ident("tool")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("minimum") {
                let value: LitInt = meta.value()?.parse()?;
                minimum = Some(value.base10_parse::<i64>()?);
                Ok(())
            } else {
                Err(meta.error("expected `minimum = N`"))
            }
        })?;
    }
    Ok(minimum)
}

fn doc_comment(attrs: &[Attribute]) -> String {
    attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            Meta::NameValue(nv) => match &nv.value {
                Expr::Lit(expr_lit) => match &expr_lit.lit {
                    Lit::Str(s) => Some(s.value().trim().to_string()),
                    _ => None,
                },
                _ => None,
            },
            _ => None,
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_option_type(ty: &Type) -> bool {
    last_segment(ty).is_some_and(|segment| segment.ident == "Option")
}

fn last_segment(ty: &Type) -> Option<&syn::PathSegment> {
    match ty {
        Type::Path(type_path) => type_path.path.segments.last(),
        _ => None,
    }
}

fn inner_type(segment: &syn::PathSegment) -> Option<&Type> {
    match &segment.arguments {
        syn::PathArguments::AngleBracketed(args) => match args.args.first() {
            Some(syn::GenericArgument::Type(inner)) => Some(inner),
            _ => None,
        },
        _ => None,
    }
}

fn type_to_schema(ty: &Type) -> TokenStream2 {
    let Some(segment) = last_segment(ty) else {
        return quote! { serde_json::json!({}) };
    };

    match segment.ident.to_string().as_str() {
        "String" | "str" => quote! { serde_json::json!({"type": "string"}) },
        "i8" | "i16" | "i32" | "i64" | "isize" | "u8" | "u16" | "u32" | "u64" | "usize" => {
            quote! { serde_json::json!({"type": "integer"}) }
        }
        "f32" | "f64" => quote! { serde_json::json!({"type": "number"}) },
        "bool" => quote! { serde_json::json!({"type": "boolean"}) },
        "Option" => match inner_type(segment) {
            Some(inner) => type_to_schema(inner),
            None => quote! { serde_json::json!({}) },
        },
        "Vec" => match inner_type(segment) {
            Some(inner) => {
                let items = type_to_schema(inner);
                quote! { serde_json::json!({"type": "array", "items": #items}) }
            }
            None => quote! { serde_json::json!({"type": "array"}) },
        },
        _ => quote! { serde_json::json!({"type": "object"}) },
    }
}

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

//! Implementation of the `#[derive(Model)]` macro.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, GenericArgument, Ident, LitStr, PathArguments, Type};

/// Parse and generate code for the `#[derive(Model)]` macro.
pub fn derive_model_impl(input: &DeriveInput) -> Result<TokenStream, syn::Error> {
    let name = &input.ident;
    let name_str = name.to_string();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Model derive only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Model derive only supports structs",
            ));
        }
    };

    let struct_attrs = parse_struct_attrs(input)?;
    let field_infos: Vec<FieldInfo> = fields.iter().map(parse_field).collect::<Result<_, _>>()?;

    let id_field = find_id_field(input, &field_infos)?;
    let id_ident = &id_field.name;

    let with_collection = struct_attrs.collection.as_ref().map(|collection| {
        quote! { .with_collection(#collection) }
    });

    let schema_fields: Vec<TokenStream> = field_infos
        .iter()
        .map(|f| {
            let field_name = f.name.to_string();
            let field_type = field_type_tokens(&f.ty);
            quote! { .field(#field_name, #field_type) }
        })
        .collect();

    let indexes_fn = struct_attrs.indexes.as_ref().map(|path| {
        quote! {
            fn indexes() -> ::std::vec::Vec<::mooring::__private::IndexModel> {
                #path()
            }
        }
    });

    Ok(quote! {
        impl ::mooring::__private::Model for #name {
            const NAME: &'static str = #name_str;

            fn schema() -> ::mooring::__private::ModelSchema {
                ::mooring::__private::ModelSchema::new(#name_str)
                    #with_collection
                    #(#schema_fields)*
            }

            fn id(&self) -> ::core::option::Option<&str> {
                self.#id_ident.as_deref()
            }

            fn set_id(&mut self, id: ::core::option::Option<::std::string::String>) {
                self.#id_ident = id;
            }

            #indexes_fn
        }
    })
}

/// Struct-level attributes parsed from `#[model(...)]`.
#[derive(Debug, Default)]
struct StructAttrs {
    collection: Option<String>,
    indexes: Option<syn::Path>,
}

fn parse_struct_attrs(input: &DeriveInput) -> Result<StructAttrs, syn::Error> {
    let mut attrs = StructAttrs::default();

    for attr in &input.attrs {
        if !attr.path().is_ident("model") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("collection") {
                let value: LitStr = meta.value()?.parse()?;
                attrs.collection = Some(value.value());
            } else if meta.path.is_ident("indexes") {
                let value: LitStr = meta.value()?.parse()?;
                attrs.indexes = Some(value.parse()?);
            }
            Ok(())
        })?;
    }

    Ok(attrs)
}

/// Information about a declared field.
struct FieldInfo {
    name: Ident,
    ty: Type,
    is_id: bool,
}

fn parse_field(field: &syn::Field) -> Result<FieldInfo, syn::Error> {
    let name = field
        .ident
        .clone()
        .ok_or_else(|| syn::Error::new_spanned(field, "Fields must be named"))?;

    let mut is_id = false;
    for attr in &field.attrs {
        if !attr.path().is_ident("model") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("id") {
                is_id = true;
            }
            Ok(())
        })?;
    }

    Ok(FieldInfo {
        name,
        ty: field.ty.clone(),
        is_id,
    })
}

/// The identifier field: marked `#[model(id)]`, else named `id`. Must be
/// typed `Option<String>` so unsaved instances carry no identifier.
fn find_id_field<'a>(
    input: &DeriveInput,
    fields: &'a [FieldInfo],
) -> Result<&'a FieldInfo, syn::Error> {
    let field = fields
        .iter()
        .find(|f| f.is_id)
        .or_else(|| fields.iter().find(|f| f.name == "id"))
        .ok_or_else(|| {
            syn::Error::new_spanned(
                input,
                "Model must have an `id` field or one marked with #[model(id)]",
            )
        })?;

    if !is_option_string(&field.ty) {
        return Err(syn::Error::new_spanned(
            &field.ty,
            "the model identifier field must be typed Option<String>",
        ));
    }
    Ok(field)
}

fn is_option_string(ty: &Type) -> bool {
    matches!(
        generic_inner(ty, "Option"),
        Some(Type::Path(p)) if p.path.segments.last().is_some_and(|s| s.ident == "String")
    )
}

/// The single generic argument of a path type whose last segment matches
/// `wrapper`, e.g. the `T` of `Option<T>`.
fn generic_inner<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    args.args.iter().find_map(|arg| match arg {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    })
}

/// Both generic arguments of a two-parameter path type, e.g. the `K, V`
/// of `HashMap<K, V>`.
fn generic_pair<'a>(ty: &'a Type, wrapper: &str) -> Option<(&'a Type, &'a Type)> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    let mut types = args.args.iter().filter_map(|arg| match arg {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    });
    Some((types.next()?, types.next()?))
}

fn is_string_type(ty: &Type) -> bool {
    matches!(ty, Type::Path(p) if p.path.segments.last().is_some_and(|s| s.ident == "String"))
}

fn last_ident(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(p) => p.path.segments.last().map(|s| s.ident.to_string()),
        _ => None,
    }
}

/// Map a Rust field type to its schema type expression.
fn field_type_tokens(ty: &Type) -> TokenStream {
    let root = quote!(::mooring::__private::FieldType);

    if let Some(inner) = generic_inner(ty, "Option") {
        let inner = field_type_tokens(inner);
        return quote! { #root::optional(#inner) };
    }
    if let Some(inner) = generic_inner(ty, "Vec") {
        // Byte buffers have no schema representation.
        if last_ident(inner).as_deref() == Some("u8") {
            return unsupported_tokens(ty);
        }
        let inner = field_type_tokens(inner);
        return quote! { #root::list(#inner) };
    }
    if let Some(inner) = generic_inner(ty, "LazyRef") {
        return match last_ident(inner) {
            Some(target) => quote! { #root::model(#target) },
            None => unsupported_tokens(ty),
        };
    }
    for map_ty in ["HashMap", "BTreeMap"] {
        if let Some((key, value)) = generic_pair(ty, map_ty) {
            if !is_string_type(key) {
                return unsupported_tokens(ty);
            }
            let value = field_type_tokens(value);
            return quote! { #root::map(#value) };
        }
    }
    if let Type::Tuple(tuple) = ty {
        let items: Vec<TokenStream> = tuple.elems.iter().map(field_type_tokens).collect();
        return quote! { #root::Tuple(::std::vec![#(#items),*]) };
    }

    match last_ident(ty) {
        Some(ident) => match ident.as_str() {
            "bool" => quote! { #root::Bool },
            "i8" | "i16" | "i32" | "i64" | "isize" | "u8" | "u16" | "u32" | "usize" => {
                quote! { #root::Int }
            }
            "f32" | "f64" => quote! { #root::Float },
            "String" | "SmolStr" => quote! { #root::String },
            "DateTime" | "NaiveDateTime" | "NaiveDate" => quote! { #root::Date },
            // Any other named type is a reference to a declared model;
            // registration resolves the name against the registry.
            _ => quote! { #root::unresolved(#ident) },
        },
        None => unsupported_tokens(ty),
    }
}

fn unsupported_tokens(ty: &Type) -> TokenStream {
    let name = quote!(#ty).to_string().replace(' ', "");
    quote! { ::mooring::__private::FieldType::unsupported(#name) }
}

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::parse::ParseStream;
use syn::{
    Attribute, Data, DeriveInput, Fields, Ident, LitStr, Token, parse_macro_input, spanned::Spanned,
};

#[proc_macro_derive(FromRow, attributes(column))]
pub fn derive_from_row(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_from_row(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[proc_macro_derive(SqlEnum, attributes(sql_enum))]
pub fn derive_sql_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_sql_enum(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Default)]
struct ColumnOptions {
    name: Option<String>,
    annotations: Vec<String>,
}

fn expand_from_row(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = input.ident;
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new(
            input.generics.span(),
            "FromRow does not support generic structs",
        ));
    }

    let fields = match input.data {
        Data::Struct(data) => data.fields,
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                "FromRow can only be derived for structs",
            ));
        }
    };

    let mut params = Vec::new();
    let mut takes = Vec::new();
    for (position, field) in fields.iter().enumerate() {
        let options = parse_column_options(&field.attrs)?;
        let ty = &field.ty;
        let column = match options.name {
            Some(name) => quote!(::std::option::Option::Some(#name)),
            None => quote!(::std::option::Option::None),
        };
        let annotations = options.annotations;
        params.push(quote! {
            ::querybind::ConstructorParam::new(
                #column,
                <#ty as ::querybind::SqlType>::type_ref(),
                &[#(#annotations),*],
            )
        });
        takes.push(quote!(args.take::<#ty>(#position)?));
    }

    let construct = match &fields {
        Fields::Named(named) => {
            let idents: Vec<&Ident> = named.named.iter().filter_map(|f| f.ident.as_ref()).collect();
            quote!(#struct_name { #(#idents: #takes),* })
        }
        Fields::Unnamed(_) => quote!(#struct_name(#(#takes),*)),
        Fields::Unit => quote!(#struct_name),
    };
    let args_binding = if fields.is_empty() {
        quote!(_args)
    } else {
        quote!(mut args)
    };

    Ok(quote! {
        impl ::querybind::Composite for #struct_name {
            fn descriptor() -> ::querybind::CompositeDescriptor {
                ::querybind::CompositeDescriptor::of::<Self>(vec![
                    ::querybind::Constructor::new(
                        vec![#(#params),*],
                        |#args_binding: ::querybind::ConstructorArgs|
                            -> ::std::result::Result<::querybind::AnyValue, ::querybind::MappingError> {
                            ::std::result::Result::Ok(
                                ::std::boxed::Box::new(#construct) as ::querybind::AnyValue
                            )
                        },
                    ),
                ])
            }
        }

        impl ::querybind::SqlType for #struct_name {
            fn type_ref() -> ::querybind::TypeRef {
                ::querybind::TypeRef::composite::<Self>()
            }
        }
    })
}

fn parse_column_options(attrs: &[Attribute]) -> syn::Result<ColumnOptions> {
    let mut options: Option<ColumnOptions> = None;

    for attr in attrs {
        if !attr.path().is_ident("column") {
            continue;
        }

        if options.is_some() {
            return Err(syn::Error::new(
                attr.span(),
                "Duplicate #[column(...)] attribute on field",
            ));
        }

        let parsed = attr.parse_args_with(|input: ParseStream| {
            let name: LitStr = input.parse()?;
            if name.value().trim().is_empty() {
                return Err(syn::Error::new(name.span(), "Column name cannot be empty"));
            }

            let mut parsed = ColumnOptions {
                name: Some(name.value()),
                annotations: Vec::new(),
            };
            while !input.is_empty() {
                input.parse::<Token![,]>()?;
                if input.is_empty() {
                    break;
                }
                let key: Ident = input.parse()?;
                if key != "annotate" {
                    return Err(syn::Error::new(
                        key.span(),
                        "Unsupported #[column(...)] option. Supported: annotate = \"...\"",
                    ));
                }
                input.parse::<Token![=]>()?;
                let marker: LitStr = input.parse()?;
                parsed.annotations.push(marker.value());
            }
            Ok(parsed)
        })?;

        options = Some(parsed);
    }

    Ok(options.unwrap_or_default())
}

fn expand_sql_enum(input: DeriveInput) -> syn::Result<TokenStream2> {
    let enum_name = input.ident;
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new(
            input.generics.span(),
            "SqlEnum does not support generic enums",
        ));
    }

    let variants = match input.data {
        Data::Enum(data) => data.variants,
        _ => {
            return Err(syn::Error::new(
                enum_name.span(),
                "SqlEnum can only be derived for enums",
            ));
        }
    };
    if variants.is_empty() {
        return Err(syn::Error::new(
            enum_name.span(),
            "SqlEnum requires at least one variant",
        ));
    }

    let mut idents = Vec::new();
    let mut labels = Vec::new();
    for variant in &variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new(
                variant.span(),
                "SqlEnum variants cannot carry fields",
            ));
        }
        let label = parse_variant_rename(&variant.attrs)?.unwrap_or_else(|| variant.ident.to_string());
        if labels.contains(&label) {
            return Err(syn::Error::new(
                variant.span(),
                format!("Duplicate SqlEnum variant name '{}'", label),
            ));
        }
        idents.push(variant.ident.clone());
        labels.push(label);
    }

    Ok(quote! {
        impl ::querybind::SqlEnum for #enum_name {
            fn variant_name(&self) -> &'static str {
                match self {
                    #(Self::#idents => #labels,)*
                }
            }

            fn from_variant_name(name: &str) -> ::std::option::Option<Self> {
                match name {
                    #(#labels => ::std::option::Option::Some(Self::#idents),)*
                    _ => ::std::option::Option::None,
                }
            }
        }

        impl ::querybind::SqlType for #enum_name {
            fn type_ref() -> ::querybind::TypeRef {
                ::querybind::TypeRef::enumeration::<Self>()
            }
        }
    })
}

fn parse_variant_rename(attrs: &[Attribute]) -> syn::Result<Option<String>> {
    let mut rename = None;

    for attr in attrs {
        if !attr.path().is_ident("sql_enum") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let value = meta.value()?;
                let lit: LitStr = value.parse()?;
                rename = Some(lit.value());
                return Ok(());
            }

            Err(meta.error("Unsupported sql_enum attribute. Supported: rename = \"...\""))
        })?;
    }

    Ok(rename)
}

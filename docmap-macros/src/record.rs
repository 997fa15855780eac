use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Error, Field, Fields, LitStr};

// derive_record
pub fn derive_record(input: TokenStream) -> TokenStream {
    match expand(input) {
        Ok(tokens) => tokens,
        Err(err) => err.to_compile_error(),
    }
}

///
/// FieldAttrs
///

#[derive(Default)]
struct FieldAttrs {
    identity: bool,
    rename: Option<LitStr>,
}

impl FieldAttrs {
    fn parse(field: &Field) -> syn::Result<Self> {
        let mut attrs = Self::default();

        for attr in field.attrs.iter().filter(|attr| attr.path().is_ident("record")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("id") {
                    attrs.identity = true;
                    Ok(())
                } else if meta.path.is_ident("rename") {
                    attrs.rename = Some(meta.value()?.parse()?);
                    Ok(())
                } else {
                    Err(meta.error("expected `id` or `rename = \"...\"`"))
                }
            })?;
        }

        Ok(attrs)
    }
}

fn expand(input: TokenStream) -> syn::Result<TokenStream> {
    let input: DeriveInput = syn::parse2(input)?;
    let ident = &input.ident;
    let name = ident.to_string();

    if !input.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &input.generics,
            "Record cannot be derived for generic types",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            other => {
                return Err(Error::new_spanned(
                    other,
                    "Record can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(Error::new_spanned(
                ident,
                "Record can only be derived for structs with named fields",
            ));
        }
    };

    let mut specs = Vec::new();
    let mut into_values = Vec::new();
    let mut from_values = Vec::new();
    let mut identity = None;

    for field in fields {
        let Some(field_ident) = field.ident.as_ref() else {
            return Err(Error::new_spanned(field, "unnamed field"));
        };
        let field_name = field_ident.to_string();
        let ty = &field.ty;
        let attrs = FieldAttrs::parse(field)?;

        let mut spec = quote! {
            ::docmap::record::FieldSpec::new(
                #field_name,
                <#ty as ::docmap::record::FieldValue>::field_type(),
            )
        };
        if let Some(rename) = &attrs.rename {
            spec = quote! { #spec.rename(#rename) };
        }
        if attrs.identity {
            if let Some(previous) = identity.replace(field_ident) {
                return Err(Error::new_spanned(
                    field_ident,
                    format!("`{previous}` is already marked as the record id"),
                ));
            }
            spec = quote! { #spec.identity() };
        }

        specs.push(spec);
        into_values.push(quote! {
            ::docmap::record::FieldValue::into_value(self.#field_ident)
        });
        from_values.push(quote! {
            #field_ident: ::docmap::record::take_field(&mut values, #field_name)?
        });
    }

    Ok(quote! {
        impl ::docmap::record::Record for #ident {
            fn record_type() -> ::docmap::record::RecordType {
                ::docmap::record::RecordType::new::<Self>(#name, || {
                    ::std::vec![#(#specs),*]
                })
            }

            fn into_values(self) -> ::std::vec::Vec<::docmap::record::Value> {
                ::std::vec![#(#into_values),*]
            }

            fn from_values(
                values: ::std::vec::Vec<::docmap::record::Value>,
            ) -> ::docmap::error::ConversionResult<Self> {
                let mut values = values.into_iter();

                ::std::result::Result::Ok(Self {
                    #(#from_values),*
                })
            }
        }

        impl ::docmap::record::FieldValue for #ident {
            fn field_type() -> ::docmap::record::FieldType {
                ::docmap::record::FieldType::Record(
                    <Self as ::docmap::record::Record>::record_type(),
                )
            }

            fn into_value(self) -> ::docmap::record::Value {
                ::docmap::record::Value::Record(
                    <Self as ::docmap::record::Record>::into_values(self),
                )
            }

            fn from_value(
                value: ::docmap::record::Value,
            ) -> ::docmap::error::ConversionResult<Self> {
                ::docmap::record::record_from_value(value)
            }
        }
    })
}

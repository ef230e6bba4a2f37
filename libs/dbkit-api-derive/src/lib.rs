use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Data, DeriveInput, Fields, GenericArgument, LitStr, PathArguments, Type, parse_macro_input};

/// Derive macro for row records.
///
/// Generates the flat field table (`dbkit_api::record::Record`) plus the
/// `RowTarget`, `Destination` and `KeyedData` impls, so the struct can be
/// read from a query result and used as an INSERT/UPDATE source.
///
/// # Example
///
/// ```ignore
/// #[derive(Record, Default)]
/// pub struct User {
///     pub id: Option<i64>,
///     #[record(rename = "userName")]
///     pub name: String,
///     pub tags: Vec<String>,          // JSON column
///     #[record(flatten)]
///     pub audit: Audit,
///     #[record(skip)]
///     pub cache: Option<String>,
/// }
/// ```
///
/// Field attributes:
/// - `rename = "..."` column name.
/// - `skip` neither read nor written.
/// - `flatten` inline the fields of another `Record` at this position.
/// - `json` store the field as JSON text. Implied for `Vec<T>` (except
///   `Vec<u8>`), `HashMap`, `BTreeMap`, `HashSet`, `BTreeSet` and `IndexMap`.
#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match derive_impl(&input) {
        Ok(tokens) => tokens,
        Err(e) => e.to_compile_error().into(),
    }
}

enum Mode {
    Plain,
    Json,
    Flatten,
}

fn derive_impl(input: &DeriveInput) -> Result<TokenStream, syn::Error> {
    let name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Record does not support generic structs",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Record only supports structs with named fields",
                ));
            }
        },
        _ => return Err(syn::Error::new_spanned(name, "Record only supports structs")),
    };

    let mut table_tokens: Vec<TokenStream2> = Vec::new();
    let mut get_tokens: Vec<TokenStream2> = Vec::new();
    let mut set_tokens: Vec<TokenStream2> = Vec::new();

    for field in fields {
        let field_name = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new_spanned(field, "expected named field"))?;
        let field_ty = &field.ty;

        // Parse #[record(...)] attribute.
        let mut column = field_name.to_string();
        let mut skip = false;
        let mut flatten = false;
        let mut json = false;

        for attr in &field.attrs {
            if !attr.path().is_ident("record") {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") {
                    let value: LitStr = meta.value()?.parse()?;
                    column = value.value();
                } else if meta.path.is_ident("skip") {
                    skip = true;
                } else if meta.path.is_ident("flatten") {
                    flatten = true;
                } else if meta.path.is_ident("json") {
                    json = true;
                } else {
                    return Err(meta.error("unknown record attribute"));
                }
                Ok(())
            })?;
        }

        if skip {
            continue;
        }

        let mode = if flatten {
            Mode::Flatten
        } else if json || is_json_type(field_ty) {
            Mode::Json
        } else {
            Mode::Plain
        };

        match mode {
            Mode::Plain => {
                table_tokens.push(quote! {
                    __fields.push(dbkit_api::record::FieldInfo {
                        name: #column,
                        kind: <#field_ty as dbkit_api::field::FieldValue>::KIND,
                        optional: <#field_ty as dbkit_api::field::FieldValue>::OPTIONAL,
                    });
                });
                get_tokens.push(quote! {
                    if __index == 0 {
                        return dbkit_api::field::FieldValue::to_value(&self.#field_name);
                    }
                    __index -= 1;
                });
                set_tokens.push(quote! {
                    if __index == 0 {
                        if let Some(v) = <#field_ty as dbkit_api::field::FieldValue>::from_value(value) {
                            self.#field_name = v;
                        }
                        return;
                    }
                    __index -= 1;
                });
            }
            Mode::Json => {
                let optional = option_inner(field_ty).is_some();
                table_tokens.push(quote! {
                    __fields.push(dbkit_api::record::FieldInfo {
                        name: #column,
                        kind: dbkit_api::value::Kind::Json,
                        optional: #optional,
                    });
                });
                get_tokens.push(quote! {
                    if __index == 0 {
                        return dbkit_api::record::json_to_value(&self.#field_name);
                    }
                    __index -= 1;
                });
                set_tokens.push(quote! {
                    if __index == 0 {
                        if let Some(v) = dbkit_api::record::json_from_value::<#field_ty>(value) {
                            self.#field_name = v;
                        }
                        return;
                    }
                    __index -= 1;
                });
            }
            Mode::Flatten => {
                table_tokens.push(quote! {
                    __fields.extend_from_slice(<#field_ty as dbkit_api::record::Record>::fields());
                });
                get_tokens.push(quote! {
                    let __n = <#field_ty as dbkit_api::record::Record>::fields().len();
                    if __index < __n {
                        return dbkit_api::record::Record::get_field(&self.#field_name, __index);
                    }
                    __index -= __n;
                });
                set_tokens.push(quote! {
                    let __n = <#field_ty as dbkit_api::record::Record>::fields().len();
                    if __index < __n {
                        dbkit_api::record::Record::set_field(&mut self.#field_name, __index, value);
                        return;
                    }
                    __index -= __n;
                });
            }
        }
    }

    let expanded = quote! {
        impl dbkit_api::record::Record for #name {
            fn fields() -> &'static [dbkit_api::record::FieldInfo] {
                static FIELDS: ::std::sync::OnceLock<::std::vec::Vec<dbkit_api::record::FieldInfo>> =
                    ::std::sync::OnceLock::new();
                FIELDS.get_or_init(|| {
                    let mut __fields = ::std::vec::Vec::new();
                    #(#table_tokens)*
                    __fields
                })
            }

            #[allow(unused_mut, unused_assignments)]
            fn get_field(&self, index: usize) -> dbkit_api::value::Value {
                let mut __index = index;
                #(#get_tokens)*
                dbkit_api::value::Value::Null
            }

            #[allow(unused_mut, unused_assignments, unused_variables)]
            fn set_field(&mut self, index: usize, value: dbkit_api::value::Value) {
                let mut __index = index;
                #(#set_tokens)*
            }
        }

        impl dbkit_api::materialize::RowTarget for #name {
            const SHAPE: dbkit_api::materialize::RowShape = dbkit_api::materialize::RowShape::Record;

            fn bind(columns: &[dbkit_api::column::Column]) -> dbkit_api::materialize::RowPlan {
                dbkit_api::record::bind::<Self>(columns)
            }

            fn fill(
                &mut self,
                plan: &dbkit_api::materialize::RowPlan,
                columns: &[dbkit_api::column::Column],
                buffers: &mut [dbkit_api::column::ScanBuffer],
            ) {
                dbkit_api::record::fill(self, plan, columns, buffers)
            }
        }

        impl dbkit_api::materialize::Destination for #name {
            type Row = Self;
            const MANY: bool = false;

            fn row(&mut self) -> &mut Self {
                self
            }
        }

        impl dbkit_api::keyed::KeyedData for #name {
            fn keyed_values(&self) -> ::std::vec::Vec<(::std::string::String, dbkit_api::value::Value)> {
                dbkit_api::record::keyed_values(self)
            }
        }
    };

    Ok(TokenStream::from(expanded))
}

/// Extract the last path segment ident name from a type (e.g. `Vec`, `String`).
fn type_ident_name(ty: &Type) -> Option<String> {
    if let Type::Path(type_path) = ty {
        type_path
            .path
            .segments
            .last()
            .map(|seg| seg.ident.to_string())
    } else {
        None
    }
}

/// First generic type argument of the last path segment (`T` in `Vec<T>`).
fn first_type_arg(ty: &Type) -> Option<&Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let PathArguments::AngleBracketed(args) = &type_path.path.segments.last()?.arguments else {
        return None;
    };
    args.args.iter().find_map(|arg| match arg {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    })
}

fn option_inner(ty: &Type) -> Option<&Type> {
    if type_ident_name(ty).as_deref() == Some("Option") {
        first_type_arg(ty)
    } else {
        None
    }
}

/// Containers that are stored as JSON text, also behind `Option`.
fn is_json_type(ty: &Type) -> bool {
    let ty = option_inner(ty).unwrap_or(ty);
    match type_ident_name(ty).as_deref() {
        Some("Vec") => first_type_arg(ty)
            .and_then(type_ident_name)
            .is_none_or(|inner| inner != "u8"),
        Some("HashMap" | "BTreeMap" | "HashSet" | "BTreeSet" | "IndexMap") => true,
        _ => false,
    }
}

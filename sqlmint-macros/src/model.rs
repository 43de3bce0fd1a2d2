use convert_case::{Case, Casing};
use darling::{FromDeriveInput, FromField, ast::Data};
use proc_macro_error2::{abort, emit_error};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Ident, Type, parse2};

#[derive(FromField, Debug, Clone)]
#[darling(attributes(sqlmint))]
struct DeriveModelField {
    ident: Option<Ident>,
    ty: Type,
    column: Option<String>,
    #[darling(default)]
    default: bool,
    #[darling(default)]
    immutable: bool,
    #[darling(default)]
    generated: bool,
    #[darling(default)]
    skip: bool,
}

#[derive(FromDeriveInput)]
#[darling(attributes(sqlmint))]
struct DeriveModelTarget {
    ident: Ident,
    table: Option<String>,
    primary_key: Ident,
    data: Data<(), DeriveModelField>,
}

#[derive(Clone)]
struct TargetColumn {
    field_ident: Ident,
    db_name: String,
    struct_name: String,
    ty: Type,
    default: bool,
    immutable: bool,
    generated: bool,
}

pub fn derive_database_model(input: TokenStream) -> TokenStream {
    let input: DeriveInput = match parse2(input) {
        Ok(e) => e,
        Err(e) => return e.to_compile_error(),
    };

    let target = match DeriveModelTarget::from_derive_input(&input) {
        Ok(r) => r,
        Err(e) => return e.write_errors(),
    };

    let Some(struct_data) = target.data.take_struct() else {
        abort! {
            input, "Target is not a struct.";
            note = "This macro must be run on a struct.";
        };
    };

    let mut skipped = vec![];
    let mut columns = vec![];

    for field in &struct_data.fields {
        let Some(ident) = &field.ident else {
            abort! {
                field.ty, "Field has no ident.";
                note = "This macro cannot be run on tuple structs.";
            };
        };

        if field.skip {
            if field.default || field.immutable || field.generated || field.column.is_some() {
                emit_error! {
                    ident.span(), "Skipped field \"{}\" cannot carry column attributes.", ident
                };
            }
            skipped.push(ident.clone());
            continue;
        }

        if field.generated && field.default {
            emit_error! {
                ident.span(), "Column \"{}\" cannot be both generated and defaulted.", ident;
                note = "Generated columns are always filled in by the database.";
            };
        }

        columns.push(TargetColumn {
            field_ident: ident.clone(),
            db_name: field.column.clone().unwrap_or_else(|| ident.to_string()),
            struct_name: ident.to_string().to_case(Case::Pascal),
            ty: field.ty.clone(),
            default: field.default,
            immutable: field.immutable,
            generated: field.generated,
        });
    }

    // Make sure all columns have unique names.
    if let Some(duplicate) = columns
        .iter()
        .find(|e| columns.iter().filter(|o| e.db_name.eq(&o.db_name)).count() > 1)
    {
        columns.iter().for_each(|e| {
            if columns.iter().filter(|o| e.db_name.eq(&o.db_name)).count() > 1 {
                emit_error! {
                    e.field_ident.span(), "Clashing occurrence of \"{}\" here.", e.db_name
                };
            }
        });

        abort! {
            duplicate.field_ident.span(), "Duplicate column definition \"{}\"", duplicate.db_name;
            note = "Columns must have unique names, if necessary use the #[sqlmint(column = \"my_column_name\")] attribute to specify a unique name.";
        }
    }

    let Some(primary_key) = columns
        .iter()
        .find(|e| e.field_ident.eq(&target.primary_key))
    else {
        abort! {
            input, "Missing primary key.";
            note = "You need to specify which column is supposed to act as the primary key, using #[sqlmint(primary_key = field_name)]";
        }
    };

    let model_ident = &target.ident;

    let columns_module = {
        let column_impls = columns.iter().map(|e| {
            let struct_name = Ident::new(e.struct_name.as_str(), e.field_ident.span());
            let db_name = &e.db_name;
            let ty = &e.ty;

            quote! {
                pub struct #struct_name;

                impl ::sqlmint::entity::column::Column for #struct_name {
                    type Type = #ty;
                    type Entity = super::#model_ident;
                    const NAME: &'static str = #db_name;
                }
            }
        });

        quote! {
            pub mod columns {
                #[allow(unused_imports)]
                use super::*;

                #(
                    #column_impls
                )*
            }
        }
    };

    let entity_impl = {
        let table_name = target
            .table
            .clone()
            .unwrap_or_else(|| target.ident.to_string().to_case(Case::Snake));

        let primary_key_struct_ident =
            Ident::new(primary_key.struct_name.as_str(), primary_key.field_ident.span());
        let primary_key_name = &primary_key.db_name;
        let primary_key_field = &primary_key.field_ident;

        let names = |filter: fn(&TargetColumn) -> bool| {
            columns
                .iter()
                .filter(|e| filter(e))
                .map(|e| e.db_name.clone())
                .collect::<Vec<_>>()
        };

        let column_names = names(|_| true);
        let with_default = names(|e| e.default);
        let without_default = names(|e| !e.default && !e.generated);
        let generated = names(|e| e.generated);
        let immutable = names(|e| e.immutable);

        let fields = columns.iter().map(|e| {
            let ident = &e.field_ident;
            let ty = &e.ty;
            let db_name = &e.db_name;

            quote! {
                ::sqlmint::entity::Field {
                    column: #db_name,
                    kind: <#ty as ::sqlmint::value::ColumnValue>::KIND,
                    get: |entity: &Self| ::sqlmint::value::ColumnValue::to_value(&entity.#ident),
                    set: |entity: &mut Self, value: ::sqlmint::value::Value| {
                        entity.#ident = ::sqlmint::value::ColumnValue::from_value(value)?;
                        ::std::result::Result::Ok(())
                    },
                }
            }
        });

        let column_copies = columns.iter().map(|e| {
            let ident = &e.field_ident;

            quote! {
                #ident: ::std::clone::Clone::clone(&self.#ident),
            }
        });

        let skipped_defaults = skipped.iter().map(|ident| {
            quote! {
                #ident: ::std::default::Default::default(),
            }
        });

        quote! {
            impl ::sqlmint::entity::Entity for #model_ident {
                type PrimaryKeyColumn = columns::#primary_key_struct_ident;

                const TABLE_NAME: &'static str = #table_name;

                const COLUMN_NAMES: &'static [&'static str] = &[#(#column_names),*];

                const PRIMARY_KEY: &'static [&'static str] = &[#primary_key_name];

                const COLUMNS_WITH_DEFAULT: &'static [&'static str] = &[#(#with_default),*];

                const COLUMNS_WITHOUT_DEFAULT: &'static [&'static str] = &[#(#without_default),*];

                const GENERATED_COLUMNS: &'static [&'static str] = &[#(#generated),*];

                const IMMUTABLE_COLUMNS: &'static [&'static str] = &[#(#immutable),*];

                const FIELDS: &'static [::sqlmint::entity::Field<Self>] = &[
                    #(#fields),*
                ];

                fn primary_key_value(&self) -> ::sqlmint::value::Value {
                    ::sqlmint::value::ColumnValue::to_value(&self.#primary_key_field)
                }

                fn detached(&self) -> Self {
                    Self {
                        #(
                            #column_copies
                        )*
                        #(
                            #skipped_defaults
                        )*
                    }
                }
            }
        }
    };

    let parse_impl = quote! {
        impl<DB> ::sqlmint::query::parse::ParseFromRow<DB> for #model_ident
        where
            DB: ::sqlmint::dialect::Dialect,
        {
            fn parse_from_row(
                row: &<DB as ::sqlmint::sqlx::Database>::Row,
            ) -> ::sqlmint::Result<Self> {
                ::sqlmint::entity::parse_full_row::<Self, DB>(row)
            }
        }
    };

    quote! {
        #entity_impl

        #parse_impl

        #columns_module
    }
}

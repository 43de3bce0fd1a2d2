use darling::{FromDeriveInput, FromField, ast::Data};
use proc_macro_error2::abort;
use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Ident, Type, parse2};

#[derive(FromField)]
#[darling(attributes(sqlmint))]
struct ParseFromRowFieldArgs {
    ident: Option<Ident>,
    ty: Type,
    column: Option<String>,
}

#[derive(FromDeriveInput)]
struct ParseFromRowArgs {
    ident: Ident,
    data: Data<(), ParseFromRowFieldArgs>,
}

pub fn parse_from_row(input: TokenStream) -> TokenStream {
    let input: DeriveInput = match parse2(input) {
        Ok(e) => e,
        Err(e) => return e.to_compile_error(),
    };

    let args = match ParseFromRowArgs::from_derive_input(&input) {
        Ok(e) => e,
        Err(e) => return e.write_errors(),
    };

    let struct_name = args.ident;
    let struct_label = struct_name.to_string();

    let Some(struct_args) = args.data.take_struct() else {
        abort! {
            struct_name, "Target is not a struct";
            note = "This macro must be run on a struct.";
        };
    };

    let field_assignments = struct_args.fields.iter().map(|e| {
        let Some(field_name) = &e.ident else {
            abort! {
                e.ty, "Field has no name";
                note = "This macro must not be run on tuple structs";
            };
        };

        let column_name = e
            .column
            .clone()
            .unwrap_or_else(|| field_name.to_string());

        quote! {
            #field_name: row.try_get(#column_name).map_err(|source| ::sqlmint::Error::Decode {
                table: #struct_label,
                column: #column_name,
                source,
            })?,
        }
    });

    let decode_bounds = struct_args.fields.iter().map(|e| {
        let ty = &e.ty;

        quote! {
            #ty: for<'r> ::sqlmint::sqlx::Decode<'r, DB> + ::sqlmint::sqlx::Type<DB>,
        }
    });

    quote! {
        impl<DB> ::sqlmint::query::parse::ParseFromRow<DB> for #struct_name
        where
            DB: ::sqlmint::dialect::Dialect,
            for<'a> &'a str: ::sqlmint::sqlx::ColumnIndex<<DB as ::sqlmint::sqlx::Database>::Row>,
            #(
                #decode_bounds
            )*
        {
            fn parse_from_row(
                row: &<DB as ::sqlmint::sqlx::Database>::Row,
            ) -> ::sqlmint::Result<Self> {
                use ::sqlmint::sqlx::Row as _;

                ::std::result::Result::Ok(Self {
                    #(
                        #field_assignments
                    )*
                })
            }
        }
    }
}

mod model;
mod parse;

use model::derive_database_model;
use proc_macro::TokenStream;
use proc_macro_error2::proc_macro_error;

/// Implement `sqlmint::entity::Entity` for a struct, and generate a `columns` module holding one
/// typed marker per column.
///
/// Container attributes: `#[sqlmint(table = "name", primary_key = field)]`. Field attributes:
/// `column = "name"`, `default`, `immutable`, `generated` and `skip` (for relationship fields).
#[proc_macro_error]
#[proc_macro_derive(DatabaseModel, attributes(sqlmint))]
pub fn database_model(input: TokenStream) -> TokenStream {
    derive_database_model(input.into()).into()
}

#[proc_macro_error]
#[proc_macro_derive(FromSqlxRow, attributes(sqlmint))]
pub fn parse_from_row(input: TokenStream) -> TokenStream {
    parse::parse_from_row(input.into()).into()
}

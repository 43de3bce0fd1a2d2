pub mod column;
pub mod hooks;
pub mod relation;

use column::Column;

use crate::{
    dialect::Dialect,
    error::{Error, Result},
    query::select::Select,
    value::{Value, ValueError, ValueKind},
};

/// Accessor pair for one column of an entity, generated by
/// [`DatabaseModel`](crate::DatabaseModel).
pub struct Field<E> {
    /// The name of the column in the database.
    pub column: &'static str,
    pub kind: ValueKind,
    pub get: fn(&E) -> Value,
    pub set: fn(&mut E, Value) -> Result<(), ValueError>,
}

/// A table, and the rust struct its rows are read into.
///
/// Usually derived using [`DatabaseModel`](crate::DatabaseModel). All column lists are in
/// declaration order.
pub trait Entity: Default + Clone + Send + Sync + Sized + 'static {
    type PrimaryKeyColumn: Column<Entity = Self>;

    /// The name of this entity's table in the database.
    const TABLE_NAME: &'static str;

    const COLUMN_NAMES: &'static [&'static str];

    const PRIMARY_KEY: &'static [&'static str];

    /// Columns the database fills in when no value is provided.
    const COLUMNS_WITH_DEFAULT: &'static [&'static str];

    const COLUMNS_WITHOUT_DEFAULT: &'static [&'static str];

    /// Columns computed by the database. These are never written.
    const GENERATED_COLUMNS: &'static [&'static str] = &[];

    /// Columns that are left out of inferred updates, e.g. a creation timestamp.
    const IMMUTABLE_COLUMNS: &'static [&'static str] = &[];

    /// One accessor per column, in the same order as [`Self::COLUMN_NAMES`].
    const FIELDS: &'static [Field<Self>];

    fn primary_key_value(&self) -> Value;

    /// A copy of this entity holding only its column values, with every relationship field
    /// reset to its default.
    #[must_use]
    fn detached(&self) -> Self;

    fn find() -> Select<Self> {
        Select::new()
    }
}

/// The column layout of an entity, detached from the entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    pub table: &'static str,
    pub columns: &'static [&'static str],
    pub primary_key: &'static [&'static str],
    pub with_default: &'static [&'static str],
    pub without_default: &'static [&'static str],
    pub generated: &'static [&'static str],
    pub immutable: &'static [&'static str],
}

impl Descriptor {
    #[must_use]
    pub const fn of<T: Entity>() -> Self {
        Self {
            table: T::TABLE_NAME,
            columns: T::COLUMN_NAMES,
            primary_key: T::PRIMARY_KEY,
            with_default: T::COLUMNS_WITH_DEFAULT,
            without_default: T::COLUMNS_WITHOUT_DEFAULT,
            generated: T::GENERATED_COLUMNS,
            immutable: T::IMMUTABLE_COLUMNS,
        }
    }
}

fn field<T: Entity>(index: usize) -> Result<&'static Field<T>> {
    T::FIELDS.get(index).ok_or_else(|| {
        Error::binding(
            T::TABLE_NAME,
            format!("field index {index} is out of range"),
        )
    })
}

/// Find the position of a column in [`Entity::FIELDS`].
///
/// # Errors
///
/// If the entity has no such column.
pub fn field_index<T: Entity>(column: &str) -> Result<usize> {
    T::FIELDS
        .iter()
        .position(|e| e.column.eq(column))
        .ok_or_else(|| Error::binding(T::TABLE_NAME, format!("unknown column \"{column}\"")))
}

/// Resolve a list of columns into the field positions used to extract or apply values.
///
/// # Errors
///
/// If any of the columns is unknown.
pub fn bind_mapping<T: Entity>(columns: &[&str]) -> Result<Vec<usize>> {
    columns.iter().map(|e| field_index::<T>(e)).collect()
}

/// Read the values of the mapped fields, in mapping order.
///
/// # Errors
///
/// If the mapping refers to a field the entity does not have.
pub fn values_from_mapping<T: Entity>(entity: &T, mapping: &[usize]) -> Result<Vec<Value>> {
    mapping
        .iter()
        .map(|e| field::<T>(*e).map(|f| (f.get)(entity)))
        .collect()
}

/// Decode the mapped columns from `row` and write them onto `entity`, in mapping order.
///
/// # Errors
///
/// If a column is missing from the row or cannot be converted into the field's type.
pub fn apply_row<T, DB>(entity: &mut T, mapping: &[usize], row: &DB::Row) -> Result<()>
where
    T: Entity,
    DB: Dialect,
{
    for index in mapping {
        let field = field::<T>(*index)?;

        let value = DB::decode(row, field.column, field.kind).map_err(|source| Error::Decode {
            table: T::TABLE_NAME,
            column: field.column,
            source,
        })?;

        (field.set)(entity, value)
            .map_err(|e| Error::binding(T::TABLE_NAME, format!("column \"{}\": {e}", field.column)))?;
    }

    Ok(())
}

/// Build a fresh entity from the mapped columns of `row`. Unmapped fields keep their default.
///
/// # Errors
///
/// See [`apply_row`].
pub fn parse_row<T, DB>(row: &DB::Row, mapping: &[usize]) -> Result<T>
where
    T: Entity,
    DB: Dialect,
{
    let mut entity = T::default();
    apply_row::<T, DB>(&mut entity, mapping, row)?;
    Ok(entity)
}

/// Parse a row holding every column of the entity.
///
/// # Errors
///
/// See [`apply_row`].
pub fn parse_full_row<T, DB>(row: &DB::Row) -> Result<T>
where
    T: Entity,
    DB: Dialect,
{
    let mapping = (0..T::FIELDS.len()).collect::<Vec<_>>();
    parse_row::<T, DB>(row, &mapping)
}

/// # Errors
///
/// If the entity has no such column.
pub fn column_value<T: Entity>(entity: &T, column: &str) -> Result<Value> {
    field::<T>(field_index::<T>(column)?).map(|f| (f.get)(entity))
}

/// # Errors
///
/// If the entity has no such column, or the value does not fit the field.
pub fn set_column_value<T: Entity>(entity: &mut T, column: &str, value: Value) -> Result<()> {
    let field = field::<T>(field_index::<T>(column)?)?;

    (field.set)(entity, value)
        .map_err(|e| Error::binding(T::TABLE_NAME, format!("column \"{column}\": {e}")))
}

/// The defaulted columns the caller has explicitly set, i.e. whose value is not zero.
#[must_use]
pub fn non_zero_defaults<T: Entity>(entity: &T) -> Vec<&'static str> {
    T::FIELDS
        .iter()
        .filter(|e| T::COLUMNS_WITH_DEFAULT.contains(&e.column))
        .filter(|e| !(e.get)(entity).is_zero())
        .map(|e| e.column)
        .collect()
}

use std::{marker::PhantomData, sync::Arc};

use itertools::Itertools;
use sqlx::Executor;

use crate::{
    dialect::Dialect,
    entity::{
        Entity,
        column::{Assignment, Column, EntityConditionExpr, OrderBy},
        relation::HasMany,
    },
    error::{Error, Result},
    repository::Repository,
    value::{Value, ValueKind},
};

use super::{BinaryExpr, BinaryExprOperand, PushToQuery, SqlWriter, quote_ident};

type Fragment = Arc<dyn PushToQuery + Send + Sync>;

/// A query over the rows of `T`, built from typed conditions on its columns.
pub struct Select<T>
where
    T: Entity,
{
    marker: PhantomData<T>,
    conditions: Vec<Fragment>,
    additional_tables: Vec<&'static str>,
    order: Vec<Fragment>,
    limit: Option<u32>,
    offset: Option<u32>,
}

impl<T> Clone for Select<T>
where
    T: Entity,
{
    fn clone(&self) -> Self {
        Self {
            marker: PhantomData,
            conditions: self.conditions.clone(),
            additional_tables: self.additional_tables.clone(),
            order: self.order.clone(),
            limit: self.limit,
            offset: self.offset,
        }
    }
}

impl<T> Default for Select<T>
where
    T: Entity,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Select<T>
where
    T: Entity,
{
    pub(crate) const fn new() -> Self {
        Self {
            marker: PhantomData,
            conditions: vec![],
            additional_tables: vec![],
            order: vec![],
            limit: None,
            offset: None,
        }
    }

    /// Append a new `WHERE` condition using an `AND` statement as glue. The passed condition is
    /// wrapped in `()` brackets.
    #[must_use]
    pub fn filter<Q>(mut self, condition: EntityConditionExpr<Q, T>) -> Self
    where
        Q: PushToQuery + Send + Sync + 'static,
    {
        self.conditions.push(Arc::new(condition));
        self
    }

    /// Append a new `WHERE` condition on the columns of a child entity `C`, keeping only rows
    /// that have at least one matching child.
    #[must_use]
    pub fn where_related<C, Q>(mut self, condition: EntityConditionExpr<Q, C>) -> Self
    where
        C: Entity,
        T: HasMany<C>,
        Q: PushToQuery + Send + Sync + 'static,
    {
        self.conditions.push(Arc::new(condition));
        self.conditions.push(Arc::new(BinaryExpr::new(
            <T::ForeignKey as Column>::full_column_name(),
            <T::PrimaryKeyColumn as Column>::full_column_name(),
            BinaryExprOperand::Equals,
        )));
        self.additional_tables.push(C::TABLE_NAME);
        self
    }

    /// Append a new `WHERE` condition on the columns of the parent entity `P`.
    #[must_use]
    pub fn where_parent<P, Q>(mut self, condition: EntityConditionExpr<Q, P>) -> Self
    where
        P: HasMany<T>,
        Q: PushToQuery + Send + Sync + 'static,
    {
        self.conditions.push(Arc::new(condition));
        self.conditions.push(Arc::new(BinaryExpr::new(
            <P::ForeignKey as Column>::full_column_name(),
            <P::PrimaryKeyColumn as Column>::full_column_name(),
            BinaryExprOperand::Equals,
        )));
        self.additional_tables.push(P::TABLE_NAME);
        self
    }

    #[must_use]
    pub fn order_by(mut self, order: OrderBy<T>) -> Self {
        self.order.push(Arc::new(order));
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Return the SQL text of this query. Placeholders are numbered `$1..$n`, the values are
    /// not included.
    #[must_use]
    pub fn query(&self) -> String {
        self.statement().0
    }

    fn push_conditions(&self, writer: &mut SqlWriter) {
        self.conditions.iter().enumerate().for_each(|(i, e)| {
            if i > 0 {
                writer.push(" AND ");
            }
            writer.push("(");
            e.push_to(writer);
            writer.push(")");
        });
    }

    /// Push the `WHERE` clause. Filters across related tables go through a subselect on the
    /// primary key so that every row is returned at most once.
    fn push_where(&self, writer: &mut SqlWriter) {
        if self.conditions.is_empty() {
            return;
        }

        writer.push(" WHERE ");

        if self.additional_tables.is_empty() {
            self.push_conditions(writer);
            return;
        }

        let primary_key = <T::PrimaryKeyColumn as Column>::full_column_name();
        writer.push(format_args!(
            "{primary_key} IN (SELECT {primary_key} FROM {}",
            quote_ident(T::TABLE_NAME)
        ));
        self.additional_tables
            .iter()
            .unique()
            .for_each(|e| writer.push(format_args!(", {}", quote_ident(e))));
        writer.push(" WHERE ");
        self.push_conditions(writer);
        writer.push(")");
    }

    fn push_tail(&self, writer: &mut SqlWriter) {
        if !self.order.is_empty() {
            writer.push(" ORDER BY ");
            self.order.iter().enumerate().for_each(|(i, e)| {
                if i > 0 {
                    writer.push(", ");
                }
                e.push_to(writer);
            });
        }

        if let Some(limit) = self.limit {
            writer.push(" LIMIT ");
            writer.push_value(Value::I64(i64::from(limit)));
        }

        if let Some(offset) = self.offset {
            writer.push(" OFFSET ");
            writer.push_value(Value::I64(i64::from(offset)));
        }
    }

    pub(crate) fn statement(&self) -> (String, Vec<Value>) {
        let mut writer = SqlWriter::new();

        writer.push("SELECT ");
        writer.push(
            T::COLUMN_NAMES
                .iter()
                .map(|e| format!("{}.{}", quote_ident(T::TABLE_NAME), quote_ident(e)))
                .join(", "),
        );
        writer.push(format_args!(" FROM {}", quote_ident(T::TABLE_NAME)));
        self.push_where(&mut writer);
        self.push_tail(&mut writer);

        writer.into_parts()
    }

    pub(crate) fn count_statement(&self) -> (String, Vec<Value>) {
        let mut writer = SqlWriter::new();

        writer.push(format_args!(
            "SELECT COUNT(*) AS \"count\" FROM {}",
            quote_ident(T::TABLE_NAME)
        ));
        self.push_where(&mut writer);

        writer.into_parts()
    }

    pub(crate) fn exists_statement(&self) -> (String, Vec<Value>) {
        let mut writer = SqlWriter::new();

        writer.push(format_args!(
            "SELECT EXISTS(SELECT 1 FROM {}",
            quote_ident(T::TABLE_NAME)
        ));
        self.push_where(&mut writer);
        writer.push(" LIMIT 1) AS \"exists\"");

        writer.into_parts()
    }

    pub(crate) fn update_statement(&self, assignments: &[Assignment<T>]) -> (String, Vec<Value>) {
        let mut writer = SqlWriter::new();

        writer.push(format_args!("UPDATE {} SET ", quote_ident(T::TABLE_NAME)));
        assignments.iter().enumerate().for_each(|(i, e)| {
            if i > 0 {
                writer.push(",");
            }
            writer.push(format_args!("{}=", quote_ident(e.column)));
            writer.push_value(e.value.clone());
        });
        self.push_where(&mut writer);

        writer.into_parts()
    }

    pub(crate) fn delete_statement(&self) -> (String, Vec<Value>) {
        let mut writer = SqlWriter::new();

        writer.push(format_args!("DELETE FROM {}", quote_ident(T::TABLE_NAME)));
        self.push_where(&mut writer);

        writer.into_parts()
    }

    /// Execute the query through `repository`, returning a single result.
    ///
    /// # Errors
    ///
    /// See [`Repository::one`].
    pub async fn one<'c, DB, E>(self, repository: &Repository<T, DB>, executor: E) -> Result<T>
    where
        DB: Dialect,
        E: Executor<'c, Database = DB>,
    {
        repository.one(executor, self).await
    }

    /// Execute the query through `repository`, returning all results.
    ///
    /// # Errors
    ///
    /// See [`Repository::all`].
    pub async fn all<'c, DB, E>(self, repository: &Repository<T, DB>, executor: E) -> Result<Vec<T>>
    where
        DB: Dialect,
        E: Executor<'c, Database = DB>,
    {
        repository.all(executor, self).await
    }

    /// Count the matching rows. Limit and offset are ignored.
    ///
    /// # Errors
    ///
    /// See [`Repository::count`].
    pub async fn count<'c, DB, E>(self, repository: &Repository<T, DB>, executor: E) -> Result<i64>
    where
        DB: Dialect,
        E: Executor<'c, Database = DB>,
    {
        repository.count(executor, self).await
    }

    /// Whether any row matches. Limit and offset are ignored.
    ///
    /// # Errors
    ///
    /// See [`Repository::exists_where`].
    pub async fn exists<'c, DB, E>(self, repository: &Repository<T, DB>, executor: E) -> Result<bool>
    where
        DB: Dialect,
        E: Executor<'c, Database = DB>,
    {
        repository.exists_where(executor, self).await
    }

    /// Set `assignments` on every matching row, returning the number of rows affected.
    ///
    /// # Errors
    ///
    /// See [`Repository::update_where`].
    pub async fn update_all<'c, DB, E>(
        self,
        repository: &Repository<T, DB>,
        executor: E,
        assignments: &[Assignment<T>],
    ) -> Result<u64>
    where
        DB: Dialect,
        E: Executor<'c, Database = DB>,
    {
        repository.update_where(executor, self, assignments).await
    }

    /// Delete every matching row, returning the number of rows affected. No hooks are run.
    ///
    /// # Errors
    ///
    /// See [`Repository::delete_where`].
    pub async fn delete_all<'c, DB, E>(
        self,
        repository: &Repository<T, DB>,
        executor: E,
    ) -> Result<u64>
    where
        DB: Dialect,
        E: Executor<'c, Database = DB>,
    {
        repository.delete_where(executor, self).await
    }
}

/// Decode a single computed column, e.g. a count.
pub(crate) fn decode_scalar<T, DB>(
    row: &DB::Row,
    column: &'static str,
    kind: ValueKind,
) -> Result<Value>
where
    T: Entity,
    DB: Dialect,
{
    DB::decode(row, column, kind).map_err(|source| Error::Decode {
        table: T::TABLE_NAME,
        column,
        source,
    })
}

#[cfg(test)]
mod test {
    use crate::entity::{
        Entity,
        column::{
            Column, ComparableColumn, NullableColumn, OrderableColumn, RangeColumn,
            StringComparableColumn,
        },
        test::{
            post::{self, Post},
            writer::{self, Writer},
        },
    };
    use crate::value::Value;

    #[test]
    fn test_select_all_columns() {
        assert_eq!(
            Writer::find().query(),
            "SELECT \"writer\".\"id\", \"writer\".\"email\", \"writer\".\"name\" FROM \"writer\""
        );
    }

    #[test]
    fn test_conditions_are_bracketed_and_numbered() {
        let (sql, values) = Post::find()
            .filter(post::columns::WriterId::is_in([1, 2]))
            .filter(
                post::columns::Title::like("a%")
                    .or(post::columns::Body::is_null())
                    .brackets(),
            )
            .filter(post::columns::Id::between(3, 9))
            .statement();

        assert!(sql.ends_with(
            "FROM \"post\" WHERE (\"post\".\"writer_id\" IN ($1, $2)) AND ((\"post\".\"title\" LIKE $3 OR \"post\".\"body\" IS NULL)) AND (\"post\".\"id\" BETWEEN $4 AND $5)"
        ));
        assert_eq!(
            values,
            vec![
                Value::I32(1),
                Value::I32(2),
                Value::Text("a%".to_string()),
                Value::I32(3),
                Value::I32(9),
            ]
        );
    }

    #[test]
    fn test_order_limit_offset() {
        let (sql, values) = Writer::find()
            .filter(writer::columns::Id::gt(10))
            .order_by(writer::columns::Name::asc())
            .order_by(writer::columns::Id::desc())
            .limit(5)
            .offset(10)
            .statement();

        assert!(sql.ends_with(
            "WHERE (\"writer\".\"id\" > $1) ORDER BY \"writer\".\"name\" ASC, \"writer\".\"id\" DESC LIMIT $2 OFFSET $3"
        ));
        assert_eq!(values, vec![Value::I32(10), Value::I64(5), Value::I64(10)]);
    }

    #[test]
    fn test_where_related_uses_a_subselect() {
        let sql = Writer::find()
            .where_related(post::columns::Title::eq("x".to_string()))
            .query();

        assert!(sql.ends_with(
            "FROM \"writer\" WHERE \"writer\".\"id\" IN (SELECT \"writer\".\"id\" FROM \"writer\", \"post\" WHERE (\"post\".\"title\" = $1) AND (\"post\".\"writer_id\" = \"writer\".\"id\"))"
        ));
    }

    #[test]
    fn test_where_parent() {
        let sql = Post::find()
            .where_parent(writer::columns::Email::not_eq("a@b.c".to_string()))
            .query();

        assert!(sql.ends_with(
            "FROM \"post\" WHERE \"post\".\"id\" IN (SELECT \"post\".\"id\" FROM \"post\", \"writer\" WHERE (\"writer\".\"email\" != $1) AND (\"post\".\"writer_id\" = \"writer\".\"id\"))"
        ));
    }

    #[test]
    fn test_bulk_statements() {
        let select = Post::find().filter(post::columns::WriterId::eq(4));

        let (sql, values) = select.update_statement(&[
            post::columns::Title::set("t".to_string()),
            post::columns::Body::set(None),
        ]);
        assert_eq!(
            sql,
            "UPDATE \"post\" SET \"title\"=$1,\"body\"=$2 WHERE (\"post\".\"writer_id\" = $3)"
        );
        assert_eq!(values.len(), 3);

        assert_eq!(
            select.delete_statement().0,
            "DELETE FROM \"post\" WHERE (\"post\".\"writer_id\" = $1)"
        );
        assert_eq!(
            select.count_statement().0,
            "SELECT COUNT(*) AS \"count\" FROM \"post\" WHERE (\"post\".\"writer_id\" = $1)"
        );
        assert_eq!(
            Post::find().exists_statement().0,
            "SELECT EXISTS(SELECT 1 FROM \"post\" LIMIT 1) AS \"exists\""
        );
    }

    #[test]
    fn test_nullable_and_orderable_filters() {
        let sql = Post::find()
            .filter(post::columns::Body::is_not_null())
            .filter(post::columns::WriterId::leq(3).and(post::columns::WriterId::geq(1)))
            .filter(post::columns::Id::not_between(1, 2))
            .filter(post::columns::WriterId::is_not_in([5]))
            .filter(post::columns::Title::ilike("A%"))
            .filter(post::columns::Id::lt(100))
            .query();

        assert!(sql.ends_with(
            "WHERE (\"post\".\"body\" IS NOT NULL) AND (\"post\".\"writer_id\" <= $1 AND \"post\".\"writer_id\" >= $2) AND (\"post\".\"id\" NOT BETWEEN $3 AND $4) AND (\"post\".\"writer_id\" NOT IN ($5)) AND (\"post\".\"title\" ILIKE $6) AND (\"post\".\"id\" < $7)"
        ));
    }
}

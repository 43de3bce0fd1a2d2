use std::{future::Future, marker::PhantomData, sync::Arc};

use sqlx::{Database, Executor};
use tracing::debug;

use crate::{
    dialect::Dialect,
    entity::{
        Descriptor, Entity, apply_row,
        column::{Assignment, Column, EntityConditionExpr},
        bind_mapping,
        hooks::{HookPoint, Hooks},
        non_zero_defaults, parse_full_row,
        relation::{HasMany, attach_children, attach_to_one, distinct_keys},
        set_column_value, values_from_mapping,
    },
    error::{BoxError, Error, Operation, Result},
    query::{BinaryExpr, BinaryExprOperand, QueryVariable, select::Select, select::decode_scalar},
    session::SessionConfig,
    statement::{CacheEntry, CacheKey, Columns, StatementCache, build},
    value::{ColumnValue, Value, ValueKind},
};

/// How an upsert resolves a conflict with an existing row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOptions {
    /// Update the existing row. When `false`, the conflicting insert is skipped.
    pub update_on_conflict: bool,
    /// The columns of the unique constraint. Empty means the primary key.
    pub conflict: Vec<&'static str>,
    /// The columns written on conflict.
    pub update: Columns,
    /// The columns written on insert.
    pub insert: Columns,
}

impl Default for UpsertOptions {
    fn default() -> Self {
        Self {
            update_on_conflict: true,
            conflict: vec![],
            update: Columns::Infer,
            insert: Columns::Infer,
        }
    }
}

impl UpsertOptions {
    #[must_use]
    pub fn do_nothing() -> Self {
        Self {
            update_on_conflict: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn on_conflict(mut self, columns: impl IntoIterator<Item = &'static str>) -> Self {
        self.conflict = columns.into_iter().collect();
        self
    }

    #[must_use]
    pub fn update(mut self, columns: Columns) -> Self {
        self.update = columns;
        self
    }

    #[must_use]
    pub fn insert(mut self, columns: Columns) -> Self {
        self.insert = columns;
        self
    }

    fn fingerprint(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            self.update_on_conflict,
            self.conflict.join(","),
            self.update.fingerprint(),
            self.insert.fingerprint()
        )
    }
}

/// Reads and writes entities of type `T` on backend `DB`.
///
/// Statements are built once per column-set shape and kept in the [`StatementCache`] shared
/// with the [`Session`](crate::Session) the repository was created from.
pub struct Repository<T, DB>
where
    T: Entity,
    DB: Dialect,
{
    cache: Arc<StatementCache>,
    config: SessionConfig,
    hooks: Hooks<T>,
    marker: PhantomData<fn() -> DB>,
}

impl<T, DB> Clone for Repository<T, DB>
where
    T: Entity,
    DB: Dialect,
{
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            config: self.config.clone(),
            hooks: self.hooks.clone(),
            marker: PhantomData,
        }
    }
}

impl<T, DB> Repository<T, DB>
where
    T: Entity,
    DB: Dialect,
{
    #[must_use]
    pub fn new(cache: Arc<StatementCache>, config: SessionConfig) -> Self {
        Self {
            cache,
            config,
            hooks: Hooks::new(),
            marker: PhantomData,
        }
    }

    /// Register a hook. Hooks for the same point run in registration order.
    #[must_use]
    pub fn with_hook<F>(mut self, point: HookPoint, hook: F) -> Self
    where
        F: Fn(&mut T) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        self.hooks.register(point, hook);
        self
    }

    #[must_use]
    pub const fn hooks(&self) -> &Hooks<T> {
        &self.hooks
    }

    fn run_hooks(&self, point: HookPoint, entity: &mut T) -> Result<()> {
        if self.config.skip_hooks {
            return Ok(());
        }

        self.hooks.run(point, entity)
    }

    fn run_hooks_all(&self, point: HookPoint, entities: &mut [T]) -> Result<()> {
        if self.config.skip_hooks || !self.hooks.has(point) {
            return Ok(());
        }

        entities.iter_mut().try_for_each(|e| self.hooks.run(point, e))
    }

    /// Await a driver call, bounded by the configured statement timeout.
    async fn timed<O, F>(&self, operation: Operation, future: F) -> Result<O>
    where
        F: Future<Output = std::result::Result<O, sqlx::Error>>,
    {
        let result = match self.config.statement_timeout {
            Some(timeout) => tokio::time::timeout(timeout, future).await.map_err(|_| {
                Error::Cancelled {
                    table: T::TABLE_NAME,
                    operation,
                }
            })?,
            None => future.await,
        };

        result.map_err(|e| Error::execution(T::TABLE_NAME, operation, e))
    }

    async fn execute<'c, E>(
        &self,
        executor: E,
        operation: Operation,
        sql: &str,
        values: Vec<Value>,
    ) -> Result<u64>
    where
        E: Executor<'c, Database = DB>,
    {
        debug!(table = T::TABLE_NAME, %operation, sql, values = ?values, "executing statement");
        self.timed(operation, DB::execute(executor, sql, values))
            .await
    }

    async fn fetch_optional<'c, E>(
        &self,
        executor: E,
        operation: Operation,
        sql: &str,
        values: Vec<Value>,
    ) -> Result<Option<DB::Row>>
    where
        E: Executor<'c, Database = DB>,
    {
        debug!(table = T::TABLE_NAME, %operation, sql, values = ?values, "executing statement");
        self.timed(operation, DB::fetch_optional(executor, sql, values))
            .await
    }

    async fn fetch_all<'c, E>(
        &self,
        executor: E,
        operation: Operation,
        sql: &str,
        values: Vec<Value>,
    ) -> Result<Vec<DB::Row>>
    where
        E: Executor<'c, Database = DB>,
    {
        debug!(table = T::TABLE_NAME, %operation, sql, values = ?values, "executing statement");
        self.timed(operation, DB::fetch_all(executor, sql, values))
            .await
    }

    fn check_bindings(placeholders: usize, values: &[Value]) -> Result<()> {
        if placeholders == values.len() {
            return Ok(());
        }

        Err(Error::binding(
            T::TABLE_NAME,
            format!(
                "statement expects {placeholders} values, {} were bound",
                values.len()
            ),
        ))
    }

    /// Insert `entity`, then read back the columns the database filled in (generated keys,
    /// server defaults).
    ///
    /// # Errors
    ///
    /// [`Error::EmptyColumnSet`] if a whitelist leaves nothing to write, a hook error, or if
    /// there's been a problem communicating with the database.
    pub async fn insert<'c, E>(&self, executor: E, entity: &mut T, columns: &Columns) -> Result<()>
    where
        E: Executor<'c, Database = DB>,
    {
        self.run_hooks(HookPoint::BeforeInsert, entity)?;

        let non_zero = non_zero_defaults(entity);
        let key = CacheKey::new::<T>(format!(
            "insert.{}.{}",
            columns.fingerprint(),
            non_zero.join(",")
        ));

        let entry = self.cache.get_or_build(key, || {
            let (write, returning) =
                columns.insert_column_set(&Descriptor::of::<T>(), &non_zero)?;
            let statement = build::insert(T::TABLE_NAME, &write, &returning);

            Ok(CacheEntry {
                sql: statement.sql,
                inputs: bind_mapping::<T>(&write)?,
                outputs: bind_mapping::<T>(&returning)?,
                placeholders: statement.placeholders,
            })
        })?;

        let values = values_from_mapping(entity, &entry.inputs)?;
        Self::check_bindings(entry.placeholders, &values)?;

        if entry.outputs.is_empty() {
            self.execute(executor, Operation::Insert, &entry.sql, values)
                .await?;
        } else {
            let row = self
                .fetch_optional(executor, Operation::Insert, &entry.sql, values)
                .await?
                .ok_or(Error::NotFound {
                    table: T::TABLE_NAME,
                })?;
            apply_row::<T, DB>(entity, &entry.outputs, &row)?;
        }

        self.run_hooks(HookPoint::AfterInsert, entity)
    }

    /// Update the row of `entity`, returning the number of rows affected.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyColumnSet`] if the policy leaves nothing to write, in which case no
    /// statement is run. Also a hook error, or a problem communicating with the database.
    pub async fn update<'c, E>(&self, executor: E, entity: &mut T, columns: &Columns) -> Result<u64>
    where
        E: Executor<'c, Database = DB>,
    {
        self.run_hooks(HookPoint::BeforeUpdate, entity)?;

        let key = CacheKey::new::<T>(format!("update.{}", columns.fingerprint()));

        let entry = self.cache.get_or_build(key, || {
            let write = columns.update_column_set(&Descriptor::of::<T>())?;
            let statement = build::update(T::TABLE_NAME, &write, T::PRIMARY_KEY);

            let mut inputs = bind_mapping::<T>(&write)?;
            inputs.extend(bind_mapping::<T>(T::PRIMARY_KEY)?);

            Ok(CacheEntry {
                sql: statement.sql,
                inputs,
                outputs: vec![],
                placeholders: statement.placeholders,
            })
        })?;

        let values = values_from_mapping(entity, &entry.inputs)?;
        Self::check_bindings(entry.placeholders, &values)?;

        let affected = self
            .execute(executor, Operation::Update, &entry.sql, values)
            .await?;

        self.run_hooks(HookPoint::AfterUpdate, entity)?;

        Ok(affected)
    }

    /// Insert `entity`, or resolve a conflict with an existing row as described by `options`.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyColumnSet`] if the insert policy leaves nothing to write, or if conflicts
    /// should update but the update policy leaves nothing to write. Also a hook error, or a
    /// problem communicating with the database.
    pub async fn upsert<'c, E>(
        &self,
        executor: E,
        entity: &mut T,
        options: &UpsertOptions,
    ) -> Result<()>
    where
        E: Executor<'c, Database = DB>,
    {
        self.run_hooks(HookPoint::BeforeUpsert, entity)?;

        let non_zero = non_zero_defaults(entity);
        let key = CacheKey::new::<T>(format!(
            "upsert.{}.{}.{}",
            options.fingerprint(),
            DB::UPSERT_RETURNING,
            non_zero.join(",")
        ));

        let entry = self.cache.get_or_build(key, || {
            let descriptor = Descriptor::of::<T>();
            let (write, returning) = options.insert.insert_column_set(&descriptor, &non_zero)?;
            let update = options.update.update_candidates(&descriptor);

            // `DEFAULT VALUES` can't carry a conflict clause on every backend.
            if write.is_empty() {
                return Err(Error::EmptyColumnSet {
                    table: T::TABLE_NAME,
                    operation: Operation::Upsert,
                });
            }

            if options.update_on_conflict && update.is_empty() {
                return Err(Error::EmptyColumnSet {
                    table: T::TABLE_NAME,
                    operation: Operation::Upsert,
                });
            }

            let conflict = if options.conflict.is_empty() {
                T::PRIMARY_KEY
            } else {
                options.conflict.as_slice()
            };
            let returning = if DB::UPSERT_RETURNING {
                returning
            } else {
                vec![]
            };

            let statement = build::upsert(
                T::TABLE_NAME,
                &write,
                conflict,
                options.update_on_conflict.then_some(update.as_slice()),
                &returning,
            );

            Ok(CacheEntry {
                sql: statement.sql,
                inputs: bind_mapping::<T>(&write)?,
                outputs: bind_mapping::<T>(&returning)?,
                placeholders: statement.placeholders,
            })
        })?;

        let values = values_from_mapping(entity, &entry.inputs)?;
        Self::check_bindings(entry.placeholders, &values)?;

        if entry.outputs.is_empty() {
            self.execute(executor, Operation::Upsert, &entry.sql, values)
                .await?;
        } else if let Some(row) = self
            .fetch_optional(executor, Operation::Upsert, &entry.sql, values)
            .await?
        {
            apply_row::<T, DB>(entity, &entry.outputs, &row)?;
        }

        self.run_hooks(HookPoint::AfterUpsert, entity)
    }

    /// Delete the row of `entity`, returning the number of rows affected.
    ///
    /// # Errors
    ///
    /// A hook error, or a problem communicating with the database.
    pub async fn delete<'c, E>(&self, executor: E, entity: &mut T) -> Result<u64>
    where
        E: Executor<'c, Database = DB>,
    {
        self.run_hooks(HookPoint::BeforeDelete, entity)?;

        let entry = self
            .cache
            .get_or_build(CacheKey::new::<T>("delete"), || {
                let statement = build::delete(T::TABLE_NAME, T::PRIMARY_KEY);

                Ok(CacheEntry {
                    sql: statement.sql,
                    inputs: bind_mapping::<T>(T::PRIMARY_KEY)?,
                    outputs: vec![],
                    placeholders: statement.placeholders,
                })
            })?;

        let values = values_from_mapping(entity, &entry.inputs)?;
        Self::check_bindings(entry.placeholders, &values)?;

        let affected = self
            .execute(executor, Operation::Delete, &entry.sql, values)
            .await?;

        self.run_hooks(HookPoint::AfterDelete, entity)?;

        Ok(affected)
    }

    /// Fetch the entity with the given primary key.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if there is no such row, a hook error, or a problem communicating
    /// with the database.
    pub async fn find<'c, E>(
        &self,
        executor: E,
        id: <T::PrimaryKeyColumn as Column>::Type,
    ) -> Result<T>
    where
        E: Executor<'c, Database = DB>,
    {
        self.find_columns(executor, id, &[]).await
    }

    /// Fetch only `columns` of the entity with the given primary key. The other fields keep
    /// their default value. An empty list fetches every column.
    ///
    /// # Errors
    ///
    /// See [`Self::find`]. Also [`Error::BindingMismatch`] for a column the entity doesn't have.
    pub async fn find_columns<'c, E>(
        &self,
        executor: E,
        id: <T::PrimaryKeyColumn as Column>::Type,
        columns: &[&'static str],
    ) -> Result<T>
    where
        E: Executor<'c, Database = DB>,
    {
        let mut entity = T::default();
        self.fetch_by_key(executor, id.to_value(), columns, &mut entity)
            .await?;

        self.run_hooks(HookPoint::AfterSelect, &mut entity)?;

        Ok(entity)
    }

    async fn fetch_by_key<'c, E>(
        &self,
        executor: E,
        key: Value,
        columns: &[&'static str],
        entity: &mut T,
    ) -> Result<()>
    where
        E: Executor<'c, Database = DB>,
    {
        let columns = if columns.is_empty() {
            T::COLUMN_NAMES
        } else {
            columns
        };

        let entry = self
            .cache
            .get_or_build(CacheKey::new::<T>(format!("find.{}", columns.join(","))), || {
                let statement = build::select_by_key(T::TABLE_NAME, columns, T::PRIMARY_KEY);

                Ok(CacheEntry {
                    sql: statement.sql,
                    inputs: bind_mapping::<T>(T::PRIMARY_KEY)?,
                    outputs: bind_mapping::<T>(columns)?,
                    placeholders: statement.placeholders,
                })
            })?;

        let row = self
            .fetch_optional(executor, Operation::Select, &entry.sql, vec![key])
            .await?
            .ok_or(Error::NotFound {
                table: T::TABLE_NAME,
            })?;

        apply_row::<T, DB>(entity, &entry.outputs, &row)
    }

    /// Whether a row with the given primary key exists.
    ///
    /// # Errors
    ///
    /// If there's been a problem communicating with the database.
    pub async fn exists<'c, E>(
        &self,
        executor: E,
        id: <T::PrimaryKeyColumn as Column>::Type,
    ) -> Result<bool>
    where
        E: Executor<'c, Database = DB>,
    {
        let entry = self
            .cache
            .get_or_build(CacheKey::new::<T>("exists"), || {
                let statement = build::exists(T::TABLE_NAME, T::PRIMARY_KEY);

                Ok(CacheEntry {
                    sql: statement.sql,
                    inputs: bind_mapping::<T>(T::PRIMARY_KEY)?,
                    outputs: vec![],
                    placeholders: statement.placeholders,
                })
            })?;

        let row = self
            .fetch_optional(executor, Operation::Exists, &entry.sql, vec![id.to_value()])
            .await?;

        match row {
            Some(row) => Ok(matches!(
                decode_scalar::<T, DB>(&row, "exists", ValueKind::Bool)?,
                Value::Bool(true)
            )),
            None => Ok(false),
        }
    }

    /// Refetch every column of `entity` from the database. Relationship fields are kept.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the row no longer exists, or a problem communicating with the
    /// database.
    pub async fn reload<'c, E>(&self, executor: E, entity: &mut T) -> Result<()>
    where
        E: Executor<'c, Database = DB>,
    {
        let key = entity.primary_key_value();
        self.fetch_by_key(executor, key, &[], entity).await
    }

    /// Run `select`, returning its first row.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if nothing matches, a hook error, or a problem communicating with the
    /// database.
    pub async fn one<'c, E>(&self, executor: E, select: Select<T>) -> Result<T>
    where
        E: Executor<'c, Database = DB>,
    {
        let (sql, values) = select.limit(1).statement();

        let row = self
            .fetch_optional(executor, Operation::Select, &sql, values)
            .await?
            .ok_or(Error::NotFound {
                table: T::TABLE_NAME,
            })?;

        let mut entity = parse_full_row::<T, DB>(&row)?;
        self.run_hooks(HookPoint::AfterSelect, &mut entity)?;

        Ok(entity)
    }

    /// Run `select`, returning every row.
    ///
    /// # Errors
    ///
    /// A hook error, or a problem communicating with the database.
    pub async fn all<'c, E>(&self, executor: E, select: Select<T>) -> Result<Vec<T>>
    where
        E: Executor<'c, Database = DB>,
    {
        let (sql, values) = select.statement();

        drop(select);

        let mut entities = self
            .fetch_all(executor, Operation::Select, &sql, values)
            .await?
            .iter()
            .map(parse_full_row::<T, DB>)
            .collect::<Result<Vec<_>>>()?;

        self.run_hooks_all(HookPoint::AfterSelect, &mut entities)?;

        Ok(entities)
    }

    /// Count the rows matching `select`. Limit and offset are ignored.
    ///
    /// # Errors
    ///
    /// If there's been a problem communicating with the database.
    pub async fn count<'c, E>(&self, executor: E, select: Select<T>) -> Result<i64>
    where
        E: Executor<'c, Database = DB>,
    {
        let (sql, values) = select.count_statement();

        let row = self
            .fetch_optional(executor, Operation::Count, &sql, values)
            .await?
            .ok_or(Error::NotFound {
                table: T::TABLE_NAME,
            })?;

        match decode_scalar::<T, DB>(&row, "count", ValueKind::I64)? {
            Value::I64(count) => Ok(count),
            other => Err(Error::binding(
                T::TABLE_NAME,
                format!("count returned {}", other.kind()),
            )),
        }
    }

    /// Whether any row matches `select`. Limit and offset are ignored.
    ///
    /// # Errors
    ///
    /// If there's been a problem communicating with the database.
    pub async fn exists_where<'c, E>(&self, executor: E, select: Select<T>) -> Result<bool>
    where
        E: Executor<'c, Database = DB>,
    {
        let (sql, values) = select.exists_statement();

        let row = self
            .fetch_optional(executor, Operation::Exists, &sql, values)
            .await?;

        match row {
            Some(row) => Ok(matches!(
                decode_scalar::<T, DB>(&row, "exists", ValueKind::Bool)?,
                Value::Bool(true)
            )),
            None => Ok(false),
        }
    }

    /// Set `assignments` on every row matching `select`, returning the number of rows affected.
    /// No hooks are run.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyColumnSet`] if `assignments` is empty, or a problem communicating with the
    /// database.
    pub async fn update_where<'c, E>(
        &self,
        executor: E,
        select: Select<T>,
        assignments: &[Assignment<T>],
    ) -> Result<u64>
    where
        E: Executor<'c, Database = DB>,
    {
        if assignments.is_empty() {
            return Err(Error::EmptyColumnSet {
                table: T::TABLE_NAME,
                operation: Operation::Update,
            });
        }

        let (sql, values) = select.update_statement(assignments);

        self.execute(executor, Operation::Update, &sql, values)
            .await
    }

    /// Delete every row matching `select`, returning the number of rows affected. No hooks are
    /// run.
    ///
    /// # Errors
    ///
    /// If there's been a problem communicating with the database.
    pub async fn delete_where<'c, E>(&self, executor: E, select: Select<T>) -> Result<u64>
    where
        E: Executor<'c, Database = DB>,
    {
        let (sql, values) = select.delete_statement();

        self.execute(executor, Operation::Delete, &sql, values)
            .await
    }

    /// Set `assignments` on the rows of all `entities` in one statement, returning the number of
    /// rows affected. The in-memory entities are left untouched.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyColumnSet`] if `assignments` is empty, or a problem communicating with the
    /// database.
    pub async fn update_all<'c, E>(
        &self,
        executor: E,
        entities: &[T],
        assignments: &[Assignment<T>],
    ) -> Result<u64>
    where
        E: Executor<'c, Database = DB>,
    {
        if assignments.is_empty() {
            return Err(Error::EmptyColumnSet {
                table: T::TABLE_NAME,
                operation: Operation::Update,
            });
        }

        if entities.is_empty() {
            return Ok(0);
        }

        let columns = assignments.iter().map(|e| e.column).collect::<Vec<_>>();
        bind_mapping::<T>(&columns)?;

        let statement = build::update_all(
            T::TABLE_NAME,
            &columns,
            T::PRIMARY_KEY,
            entities.len(),
        );

        let values = assignments
            .iter()
            .map(|e| e.value.clone())
            .chain(entities.iter().map(Entity::primary_key_value))
            .collect::<Vec<_>>();
        Self::check_bindings(statement.placeholders, &values)?;

        self.execute(executor, Operation::Update, &statement.sql, values)
            .await
    }

    /// Delete the rows of all `entities` in one statement, returning the number of rows
    /// affected. Delete hooks run for every entity.
    ///
    /// # Errors
    ///
    /// A hook error, or a problem communicating with the database.
    pub async fn delete_all<'c, E>(&self, executor: E, entities: &mut [T]) -> Result<u64>
    where
        E: Executor<'c, Database = DB>,
    {
        if entities.is_empty() {
            return Ok(0);
        }

        self.run_hooks_all(HookPoint::BeforeDelete, entities)?;

        let statement = build::delete_all(T::TABLE_NAME, T::PRIMARY_KEY, entities.len());
        let values = entities
            .iter()
            .map(Entity::primary_key_value)
            .collect::<Vec<_>>();
        Self::check_bindings(statement.placeholders, &values)?;

        let affected = self
            .execute(executor, Operation::Delete, &statement.sql, values)
            .await?;

        self.run_hooks_all(HookPoint::AfterDelete, entities)?;

        Ok(affected)
    }

    /// Refetch all `entities` in one statement, replacing the contents of the vector with the
    /// rows that still exist.
    ///
    /// # Errors
    ///
    /// If there's been a problem communicating with the database.
    pub async fn reload_all<'c, E>(&self, executor: E, entities: &mut Vec<T>) -> Result<()>
    where
        E: Executor<'c, Database = DB>,
    {
        let keys = distinct_keys(entities);

        if keys.is_empty() {
            return Ok(());
        }

        let statement = build::select_by_keys(
            T::TABLE_NAME,
            T::COLUMN_NAMES,
            T::PRIMARY_KEY,
            keys.len(),
        );
        Self::check_bindings(statement.placeholders, &keys)?;

        *entities = self
            .fetch_all(executor, Operation::Select, &statement.sql, keys)
            .await?
            .iter()
            .map(parse_full_row::<T, DB>)
            .collect::<Result<Vec<_>>>()?;

        Ok(())
    }

    /// Eager load the `C` children of all `parents` with a single query. Children whose foreign
    /// key matches none of the parents are dropped.
    ///
    /// # Errors
    ///
    /// A hook error, or a problem communicating with the database.
    pub async fn load_into<'c, C, E>(
        &self,
        children: &Repository<C, DB>,
        executor: E,
        parents: &mut [T],
    ) -> Result<()>
    where
        C: Entity,
        T: HasMany<C>,
        E: Executor<'c, Database = DB>,
    {
        let keys = distinct_keys(parents);

        if keys.is_empty() {
            return Ok(());
        }

        let select = Select::<C>::new().filter(EntityConditionExpr::from(BinaryExpr::new(
            <T::ForeignKey as Column>::full_column_name(),
            keys.into_iter().map(QueryVariable).collect::<Vec<_>>(),
            BinaryExprOperand::In,
        )));

        let found = children.all(executor, select).await?;
        attach_children(parents, found)
    }

    /// Eager load the `C` children of a single `parent`, replacing the ones it already holds.
    ///
    /// # Errors
    ///
    /// A hook error, or a problem communicating with the database.
    pub async fn load_into_one<'c, C, E>(
        &self,
        children: &Repository<C, DB>,
        executor: E,
        parent: &mut T,
    ) -> Result<()>
    where
        C: Entity,
        T: HasMany<C>,
        E: Executor<'c, Database = DB>,
    {
        let found = children.all(executor, parent.related()).await?;

        parent.children_mut().clear();
        attach_to_one(parent, found);

        Ok(())
    }

    /// Point every entity in `related` at `parent` and attach them to it.
    ///
    /// With `insert`, every child is inserted (inferring its columns). Otherwise the children
    /// already exist and only their foreign key is updated.
    ///
    /// # Errors
    ///
    /// A hook error, or a problem communicating with the database. Children processed before
    /// the error keep their changes; wrap the call in a transaction to make it atomic.
    pub async fn add_children<C>(
        &self,
        children: &Repository<C, DB>,
        connection: &mut <DB as Database>::Connection,
        parent: &mut T,
        insert: bool,
        related: Vec<C>,
    ) -> Result<()>
    where
        C: Entity,
        T: HasMany<C>,
        for<'e> &'e mut <DB as Database>::Connection: Executor<'e, Database = DB>,
    {
        let parent_key = parent.primary_key_value();
        let foreign_key = <T::ForeignKey as Column>::NAME;

        let mut attached = Vec::with_capacity(related.len());

        for mut child in related {
            set_column_value(&mut child, foreign_key, parent_key.clone())?;

            if insert {
                children
                    .insert(&mut *connection, &mut child, &Columns::Infer)
                    .await?;
            } else {
                let statement = build::update(C::TABLE_NAME, &[foreign_key], C::PRIMARY_KEY);
                let values = vec![parent_key.clone(), child.primary_key_value()];
                Repository::<C, DB>::check_bindings(statement.placeholders, &values)?;

                children
                    .execute(&mut *connection, Operation::Update, &statement.sql, values)
                    .await?;
            }

            attached.push(child);
        }

        attach_to_one(parent, attached);

        Ok(())
    }
}

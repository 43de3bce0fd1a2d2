use std::{fmt::Display, marker::PhantomData};

use crate::{
    entity::Entity,
    query::{
        BinaryExpr, BinaryExprOperand, BracketsExpr, PushToQuery, QueryVariable, SingletonExpr,
        SingletonExprOperand, SqlWriter, quote_ident,
    },
    value::{ColumnValue, Value},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnName {
    table_or_alias: Option<String>,
    column_name: String,
}

impl ColumnName {
    pub fn new(column_name: impl Into<String>) -> Self {
        Self {
            table_or_alias: None,
            column_name: column_name.into(),
        }
    }

    pub fn new_with_table_or_alias(
        table_or_alias: impl Into<String>,
        column_name: impl Into<String>,
    ) -> Self {
        Self {
            table_or_alias: Some(table_or_alias.into()),
            column_name: column_name.into(),
        }
    }
}

impl Display for ColumnName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(table_or_alias) = &self.table_or_alias {
            write!(f, "{}.", quote_ident(table_or_alias))?;
        }
        write!(f, "{}", quote_ident(&self.column_name))
    }
}

impl PushToQuery for ColumnName {
    fn push_to(&self, writer: &mut SqlWriter) {
        writer.push(self);
    }
}

pub struct EntityConditionExpr<Q, E>
where
    Q: PushToQuery,
    E: Entity,
{
    marker: PhantomData<E>,
    inner: Q,
}

impl<Q, E> EntityConditionExpr<Q, E>
where
    Q: PushToQuery,
    E: Entity,
{
    pub fn and<OQ>(
        self,
        other: EntityConditionExpr<OQ, E>,
    ) -> EntityConditionExpr<impl PushToQuery, E>
    where
        OQ: PushToQuery,
    {
        EntityConditionExpr {
            marker: PhantomData,
            inner: BinaryExpr::new(self.inner, other, BinaryExprOperand::And),
        }
    }

    pub fn or<OQ>(
        self,
        other: EntityConditionExpr<OQ, E>,
    ) -> EntityConditionExpr<impl PushToQuery, E>
    where
        OQ: PushToQuery,
    {
        EntityConditionExpr {
            marker: PhantomData,
            inner: BinaryExpr::new(self.inner, other, BinaryExprOperand::Or),
        }
    }

    /// Wrap the condition into brackets `()`.
    pub fn brackets(self) -> EntityConditionExpr<impl PushToQuery, E> {
        EntityConditionExpr {
            marker: PhantomData,
            inner: BracketsExpr::new(self.inner),
        }
    }
}

impl<Q, E> From<Q> for EntityConditionExpr<Q, E>
where
    Q: PushToQuery,
    E: Entity,
{
    fn from(value: Q) -> Self {
        Self {
            inner: value,
            marker: PhantomData,
        }
    }
}

impl<Q, E> PushToQuery for EntityConditionExpr<Q, E>
where
    Q: PushToQuery,
    E: Entity,
{
    fn push_to(&self, writer: &mut SqlWriter) {
        self.inner.push_to(writer);
    }
}

/// A `column = value` pair, used by bulk updates.
pub struct Assignment<E: Entity> {
    pub(crate) column: &'static str,
    pub(crate) value: Value,
    marker: PhantomData<E>,
}

/// A sort key for [`Select::order_by`](crate::query::select::Select::order_by).
pub struct OrderBy<E: Entity> {
    pub(crate) column: ColumnName,
    pub(crate) descending: bool,
    marker: PhantomData<E>,
}

impl<E: Entity> PushToQuery for OrderBy<E> {
    fn push_to(&self, writer: &mut SqlWriter) {
        writer.push(&self.column);
        writer.push(if self.descending { " DESC" } else { " ASC" });
    }
}

pub trait Column {
    /// The underlying rust type of this column.
    type Type: ColumnValue;

    /// The entity that this column belongs to.
    type Entity: Entity;

    /// The name this column has in the database.
    const NAME: &'static str;

    /// The fully qualified name of this column, usually something like
    /// `"entity_table_name"."column_name"`.
    fn full_column_name() -> ColumnName {
        ColumnName::new_with_table_or_alias(Self::Entity::TABLE_NAME, Self::NAME)
    }

    fn set(value: Self::Type) -> Assignment<Self::Entity> {
        Assignment {
            column: Self::NAME,
            value: value.to_value(),
            marker: PhantomData,
        }
    }

    fn asc() -> OrderBy<Self::Entity> {
        OrderBy {
            column: Self::full_column_name(),
            descending: false,
            marker: PhantomData,
        }
    }

    fn desc() -> OrderBy<Self::Entity> {
        OrderBy {
            column: Self::full_column_name(),
            descending: true,
            marker: PhantomData,
        }
    }
}

pub trait NullableColumn: Column + Sized {
    fn is_null() -> EntityConditionExpr<impl PushToQuery, Self::Entity> {
        SingletonExpr::new(Self::full_column_name(), SingletonExprOperand::IsNull).into()
    }

    fn is_not_null() -> EntityConditionExpr<impl PushToQuery, Self::Entity> {
        SingletonExpr::new(Self::full_column_name(), SingletonExprOperand::IsNotNull).into()
    }
}

impl<T, Type> NullableColumn for T where T: Column<Type = Option<Type>> {}

pub trait ComparableColumn: Column + Sized {
    fn eq(other: Self::Type) -> EntityConditionExpr<impl PushToQuery, Self::Entity>;

    fn not_eq(other: Self::Type) -> EntityConditionExpr<impl PushToQuery, Self::Entity>;

    fn is_in(
        other: impl IntoIterator<Item = Self::Type>,
    ) -> EntityConditionExpr<impl PushToQuery, Self::Entity>;

    fn is_not_in(
        other: impl IntoIterator<Item = Self::Type>,
    ) -> EntityConditionExpr<impl PushToQuery, Self::Entity>;
}

impl<T> ComparableColumn for T
where
    T: Column,
    T::Type: PartialEq,
{
    fn eq(other: Self::Type) -> EntityConditionExpr<impl PushToQuery, Self::Entity> {
        BinaryExpr::new(
            Self::full_column_name(),
            QueryVariable(other.to_value()),
            BinaryExprOperand::Equals,
        )
        .into()
    }

    fn not_eq(other: Self::Type) -> EntityConditionExpr<impl PushToQuery, Self::Entity> {
        BinaryExpr::new(
            Self::full_column_name(),
            QueryVariable(other.to_value()),
            BinaryExprOperand::DoesNotEqual,
        )
        .into()
    }

    fn is_in(
        other: impl IntoIterator<Item = Self::Type>,
    ) -> EntityConditionExpr<impl PushToQuery, Self::Entity> {
        BinaryExpr::new(
            Self::full_column_name(),
            other
                .into_iter()
                .map(|e| QueryVariable(e.to_value()))
                .collect::<Vec<_>>(),
            BinaryExprOperand::In,
        )
        .into()
    }

    fn is_not_in(
        other: impl IntoIterator<Item = Self::Type>,
    ) -> EntityConditionExpr<impl PushToQuery, Self::Entity> {
        BinaryExpr::new(
            Self::full_column_name(),
            other
                .into_iter()
                .map(|e| QueryVariable(e.to_value()))
                .collect::<Vec<_>>(),
            BinaryExprOperand::NotIn,
        )
        .into()
    }
}

pub trait StringComparableColumn: Column + Sized {
    fn like(other: impl Into<String>) -> EntityConditionExpr<impl PushToQuery, Self::Entity> {
        BinaryExpr::new(
            Self::full_column_name(),
            QueryVariable(Value::Text(other.into())),
            BinaryExprOperand::Like,
        )
        .into()
    }

    /// Case-insensitive `LIKE`. Postgres only.
    fn ilike(other: impl Into<String>) -> EntityConditionExpr<impl PushToQuery, Self::Entity> {
        BinaryExpr::new(
            Self::full_column_name(),
            QueryVariable(Value::Text(other.into())),
            BinaryExprOperand::ILike,
        )
        .into()
    }
}

impl<T> StringComparableColumn for T
where
    T: Column,
    T::Type: Into<String>,
{
}

pub trait OrderableColumn: Column + Sized {
    fn gt(other: Self::Type) -> EntityConditionExpr<impl PushToQuery, Self::Entity>;

    fn lt(other: Self::Type) -> EntityConditionExpr<impl PushToQuery, Self::Entity>;

    fn geq(other: Self::Type) -> EntityConditionExpr<impl PushToQuery, Self::Entity>;

    fn leq(other: Self::Type) -> EntityConditionExpr<impl PushToQuery, Self::Entity>;
}

impl<T> OrderableColumn for T
where
    T: Column,
    T::Type: PartialOrd,
{
    fn gt(other: Self::Type) -> EntityConditionExpr<impl PushToQuery, Self::Entity> {
        BinaryExpr::new(
            Self::full_column_name(),
            QueryVariable(other.to_value()),
            BinaryExprOperand::Gt,
        )
        .into()
    }

    fn lt(other: Self::Type) -> EntityConditionExpr<impl PushToQuery, Self::Entity> {
        BinaryExpr::new(
            Self::full_column_name(),
            QueryVariable(other.to_value()),
            BinaryExprOperand::Lt,
        )
        .into()
    }

    fn geq(other: Self::Type) -> EntityConditionExpr<impl PushToQuery, Self::Entity> {
        BinaryExpr::new(
            Self::full_column_name(),
            QueryVariable(other.to_value()),
            BinaryExprOperand::Geq,
        )
        .into()
    }

    fn leq(other: Self::Type) -> EntityConditionExpr<impl PushToQuery, Self::Entity> {
        BinaryExpr::new(
            Self::full_column_name(),
            QueryVariable(other.to_value()),
            BinaryExprOperand::Leq,
        )
        .into()
    }
}

pub trait RangeColumn: Column + Sized {
    fn between(
        left: Self::Type,
        right: Self::Type,
    ) -> EntityConditionExpr<impl PushToQuery, Self::Entity>;

    fn not_between(
        left: Self::Type,
        right: Self::Type,
    ) -> EntityConditionExpr<impl PushToQuery, Self::Entity>;
}

impl<T> RangeColumn for T
where
    T: Column,
    T::Type: PartialOrd,
{
    fn between(
        left: Self::Type,
        right: Self::Type,
    ) -> EntityConditionExpr<impl PushToQuery, Self::Entity> {
        BinaryExpr::new(
            Self::full_column_name(),
            BinaryExpr::new(
                QueryVariable(left.to_value()),
                QueryVariable(right.to_value()),
                BinaryExprOperand::And,
            ),
            BinaryExprOperand::Between,
        )
        .into()
    }

    fn not_between(
        left: Self::Type,
        right: Self::Type,
    ) -> EntityConditionExpr<impl PushToQuery, Self::Entity> {
        BinaryExpr::new(
            Self::full_column_name(),
            BinaryExpr::new(
                QueryVariable(left.to_value()),
                QueryVariable(right.to_value()),
                BinaryExprOperand::And,
            ),
            BinaryExprOperand::NotBetween,
        )
        .into()
    }
}

pub mod parse;
pub mod raw;
pub mod select;

use std::{fmt::Display, fmt::Write, ops::Deref, sync::Arc};

use crate::value::Value;

/// Accumulates SQL text together with the values bound to its placeholders.
///
/// Placeholders are numbered `$1..$n` in the order values are pushed, so the text and the
/// value list can never drift apart.
#[derive(Debug, Default)]
pub struct SqlWriter {
    sql: String,
    values: Vec<Value>,
}

impl SqlWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: impl Display) {
        let _ = write!(self.sql, "{fragment}");
    }

    /// Push a placeholder for `value`.
    pub fn push_value(&mut self, value: Value) {
        self.values.push(value);
        let _ = write!(self.sql, "${}", self.values.len());
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.values)
    }
}

/// Quote an identifier, doubling any embedded quotes.
#[must_use]
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// This trait represents anything that can be pushed into a [`SqlWriter`], i.e. any kind of
/// query fragment, like a condition or a list of values.
pub trait PushToQuery {
    /// Push the object's contents into a writer.
    fn push_to(&self, writer: &mut SqlWriter);
}

impl PushToQuery for Box<dyn PushToQuery + Send + Sync> {
    fn push_to(&self, writer: &mut SqlWriter) {
        self.deref().push_to(writer);
    }
}

impl PushToQuery for Arc<dyn PushToQuery + Send + Sync> {
    fn push_to(&self, writer: &mut SqlWriter) {
        self.deref().push_to(writer);
    }
}

pub(crate) struct QueryVariable(pub(crate) Value);

impl PushToQuery for QueryVariable {
    fn push_to(&self, writer: &mut SqlWriter) {
        writer.push_value(self.0.clone());
    }
}

impl PushToQuery for Vec<QueryVariable> {
    fn push_to(&self, writer: &mut SqlWriter) {
        writer.push("(");
        self.iter().enumerate().for_each(|(i, e)| {
            if i > 0 {
                writer.push(", ");
            }
            e.push_to(writer);
        });
        writer.push(")");
    }
}

pub(crate) struct BracketsExpr<T: PushToQuery>(T);

impl<T: PushToQuery> BracketsExpr<T> {
    pub(crate) const fn new(inner: T) -> Self {
        Self(inner)
    }
}

impl<T: PushToQuery> PushToQuery for BracketsExpr<T> {
    fn push_to(&self, writer: &mut SqlWriter) {
        writer.push("(");
        self.0.push_to(writer);
        writer.push(")");
    }
}

pub(crate) enum BinaryExprOperand {
    Equals,
    DoesNotEqual,
    Like,
    ILike,
    And,
    Or,
    In,
    NotIn,
    Between,
    NotBetween,
    Gt,
    Lt,
    Geq,
    Leq,
}

impl Display for BinaryExprOperand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Equals => "=",
                Self::DoesNotEqual => "!=",
                Self::Like => "LIKE",
                Self::ILike => "ILIKE",
                Self::And => "AND",
                Self::Or => "OR",
                Self::In => "IN",
                Self::NotIn => "NOT IN",
                Self::Between => "BETWEEN",
                Self::NotBetween => "NOT BETWEEN",
                Self::Gt => ">",
                Self::Lt => "<",
                Self::Geq => ">=",
                Self::Leq => "<=",
            }
        )
    }
}

/// A binary SQL expression, glued together with an operator.
///
/// Example: `left-side [operator] right-side`
pub(crate) struct BinaryExpr<T, C>
where
    T: PushToQuery,
    C: PushToQuery,
{
    a: T,
    b: C,
    operand: BinaryExprOperand,
}

impl<T, C> BinaryExpr<T, C>
where
    T: PushToQuery,
    C: PushToQuery,
{
    pub(crate) const fn new(left: T, right: C, operand: BinaryExprOperand) -> Self {
        Self {
            a: left,
            b: right,
            operand,
        }
    }
}

impl<T, C> PushToQuery for BinaryExpr<T, C>
where
    T: PushToQuery,
    C: PushToQuery,
{
    fn push_to(&self, writer: &mut SqlWriter) {
        self.a.push_to(writer);
        writer.push(format_args!(" {} ", self.operand));
        self.b.push_to(writer);
    }
}

pub(crate) enum SingletonExprOperand {
    IsNull,
    IsNotNull,
}

impl Display for SingletonExprOperand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::IsNull => "IS NULL",
                Self::IsNotNull => "IS NOT NULL",
            }
        )
    }
}

pub(crate) struct SingletonExpr<T>
where
    T: PushToQuery,
{
    inner: T,
    operand: SingletonExprOperand,
}

impl<T> SingletonExpr<T>
where
    T: PushToQuery,
{
    pub(crate) const fn new(inner: T, operand: SingletonExprOperand) -> Self {
        Self { inner, operand }
    }
}

impl<T> PushToQuery for SingletonExpr<T>
where
    T: PushToQuery,
{
    fn push_to(&self, writer: &mut SqlWriter) {
        self.inner.push_to(writer);
        writer.push(format_args!(" {}", self.operand));
    }
}

#[cfg(test)]
mod test {
    use super::{
        BinaryExpr, BinaryExprOperand, BracketsExpr, PushToQuery, QueryVariable, SqlWriter,
        quote_ident,
    };
    use crate::{entity::column::ColumnName, value::Value};

    #[test]
    fn test_placeholders_follow_push_order() {
        let expr = BracketsExpr::new(BinaryExpr::new(
            BinaryExpr::new(
                ColumnName::new_with_table_or_alias("author", "id"),
                vec![QueryVariable(Value::I32(1)), QueryVariable(Value::I32(2))],
                BinaryExprOperand::In,
            ),
            BinaryExpr::new(
                ColumnName::new("name"),
                QueryVariable(Value::Text("x".into())),
                BinaryExprOperand::Equals,
            ),
            BinaryExprOperand::Or,
        ));

        let mut writer = SqlWriter::new();
        expr.push_to(&mut writer);
        let (sql, values) = writer.into_parts();

        assert_eq!(
            sql,
            "(\"author\".\"id\" IN ($1, $2) OR \"name\" = $3)"
        );
        assert_eq!(
            values,
            vec![Value::I32(1), Value::I32(2), Value::Text("x".into())]
        );
    }

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("order"), "\"order\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}

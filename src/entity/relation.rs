use std::sync::Arc;

use tracing::trace;

use super::{
    Entity,
    column::{Column, EntityConditionExpr},
    column_value,
};
use crate::{
    error::Result,
    query::{BinaryExpr, BinaryExprOperand, QueryVariable, select::Select},
    value::Value,
};

/// A one-to-many relation, implemented on the parent side. `C` is the child entity, which stores
/// the parent's primary key in [`HasMany::ForeignKey`].
///
/// The relationship fields themselves are plain struct fields marked `#[sqlmint(skip)]`; this
/// trait only tells the loader where to put things.
pub trait HasMany<C: Entity>: Entity {
    /// The column on `C` holding this entity's primary key.
    type ForeignKey: Column<Entity = C>;

    /// The cached children of this entity.
    fn children_mut(&mut self) -> &mut Vec<C>;

    /// Store a back-reference to `parent` on `child`.
    fn set_parent(child: &mut C, parent: Arc<Self>);

    /// Query the children of this entity.
    fn related(&self) -> Select<C> {
        Select::new().filter(EntityConditionExpr::from(BinaryExpr::new(
            <Self::ForeignKey as Column>::full_column_name(),
            QueryVariable(self.primary_key_value()),
            BinaryExprOperand::Equals,
        )))
    }
}

/// The distinct primary keys of `parents`, in the order they are first seen. `NULL` keys are
/// skipped since they can never match a foreign key.
#[must_use]
pub fn distinct_keys<P: Entity>(parents: &[P]) -> Vec<Value> {
    parents.iter().fold(vec![], |mut acc, e| {
        let key = e.primary_key_value();
        if !matches!(key, Value::Null(_)) && !acc.contains(&key) {
            acc.push(key);
        }
        acc
    })
}

/// Distribute `children` onto `parents` by matching each child's foreign key against the
/// parents' primary keys. Children without a matching parent are dropped.
///
/// # Errors
///
/// If the foreign key column is not declared on the child entity.
pub fn attach_children<P, C>(parents: &mut [P], children: Vec<C>) -> Result<()>
where
    P: HasMany<C>,
    C: Entity,
{
    let keys = parents
        .iter()
        .map(Entity::primary_key_value)
        .collect::<Vec<_>>();
    let snapshots = parents
        .iter()
        .map(|e| Arc::new(e.detached()))
        .collect::<Vec<_>>();

    for mut child in children {
        let foreign_key = column_value(&child, <P::ForeignKey as Column>::NAME)?;

        let Some(index) = keys.iter().position(|e| e.eq(&foreign_key)) else {
            trace!(
                table = C::TABLE_NAME,
                foreign_key = ?foreign_key,
                "dropping child without a matching parent"
            );
            continue;
        };

        P::set_parent(&mut child, Arc::clone(&snapshots[index]));
        parents[index].children_mut().push(child);
    }

    Ok(())
}

/// Attach every child to the single `parent`.
pub fn attach_to_one<P, C>(parent: &mut P, children: Vec<C>)
where
    P: HasMany<C>,
    C: Entity,
{
    let snapshot = Arc::new(parent.detached());

    parent
        .children_mut()
        .extend(children.into_iter().map(|mut e| {
            P::set_parent(&mut e, Arc::clone(&snapshot));
            e
        }));
}

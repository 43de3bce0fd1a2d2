use std::{fmt::Display, sync::Arc};

use crate::error::{BoxError, Error};

/// The points in an entity's lifecycle a hook can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    AfterSelect,
    BeforeInsert,
    AfterInsert,
    BeforeUpdate,
    AfterUpdate,
    BeforeDelete,
    AfterDelete,
    BeforeUpsert,
    AfterUpsert,
}

impl Display for HookPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::AfterSelect => "after select",
                Self::BeforeInsert => "before insert",
                Self::AfterInsert => "after insert",
                Self::BeforeUpdate => "before update",
                Self::AfterUpdate => "after update",
                Self::BeforeDelete => "before delete",
                Self::AfterDelete => "after delete",
                Self::BeforeUpsert => "before upsert",
                Self::AfterUpsert => "after upsert",
            }
        )
    }
}

pub type Hook<T> = Arc<dyn Fn(&mut T) -> Result<(), BoxError> + Send + Sync>;

/// An ordered list of lifecycle callbacks for one entity type.
pub struct Hooks<T> {
    hooks: Vec<(HookPoint, Hook<T>)>,
}

impl<T> Hooks<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    pub fn register<F>(&mut self, point: HookPoint, hook: F)
    where
        F: Fn(&mut T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.hooks.push((point, Arc::new(hook)));
    }

    #[must_use]
    pub fn has(&self, point: HookPoint) -> bool {
        self.hooks.iter().any(|(p, _)| *p == point)
    }

    /// Run every hook registered for `point`, in registration order. Stops at the first error.
    ///
    /// # Errors
    ///
    /// The first error returned by a hook.
    pub fn run(&self, point: HookPoint, entity: &mut T) -> Result<(), Error> {
        self.hooks
            .iter()
            .filter(|(p, _)| *p == point)
            .try_for_each(|(_, hook)| hook(entity).map_err(|source| Error::Hook { point, source }))
    }
}

impl<T> Default for Hooks<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Hooks<T> {
    fn clone(&self) -> Self {
        Self {
            hooks: self.hooks.clone(),
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::{HookPoint, Hooks};
    use crate::error::Error;

    #[test]
    fn test_hooks_run_in_order_for_their_point() {
        let mut hooks = Hooks::<Vec<&'static str>>::new();
        hooks.register(HookPoint::BeforeInsert, |e| {
            e.push("first");
            Ok(())
        });
        hooks.register(HookPoint::AfterInsert, |e| {
            e.push("after");
            Ok(())
        });
        hooks.register(HookPoint::BeforeInsert, |e| {
            e.push("second");
            Ok(())
        });

        let mut log = vec![];
        hooks.run(HookPoint::BeforeInsert, &mut log).unwrap();

        assert_eq!(log, vec!["first", "second"]);
        assert!(hooks.has(HookPoint::AfterInsert));
        assert!(!hooks.has(HookPoint::AfterDelete));
    }

    #[test]
    fn test_failing_hook_stops_the_chain() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut hooks = Hooks::<()>::new();
        hooks.register(HookPoint::BeforeDelete, |()| Err("protected".into()));
        hooks.register(HookPoint::BeforeDelete, move |()| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let err = hooks.run(HookPoint::BeforeDelete, &mut ()).unwrap_err();

        assert!(matches!(
            err,
            Error::Hook {
                point: HookPoint::BeforeDelete,
                ..
            }
        ));
        assert_eq!(err.to_string(), "before delete hook failed: protected");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}

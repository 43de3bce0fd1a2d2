use std::{sync::Arc, time::Duration};

use crate::{dialect::Dialect, entity::Entity, repository::Repository, statement::StatementCache};

/// Settings shared by every repository of a [`Session`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionConfig {
    /// Upper bound for the execution of a single statement. `None` waits forever.
    pub statement_timeout: Option<Duration>,
    /// Disable all lifecycle hooks.
    pub skip_hooks: bool,
}

impl SessionConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            statement_timeout: None,
            skip_hooks: false,
        }
    }

    #[must_use]
    pub const fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub const fn with_skip_hooks(mut self, skip_hooks: bool) -> Self {
        self.skip_hooks = skip_hooks;
        self
    }
}

/// Owns the statement cache. Create one per application and hand out repositories from it.
#[derive(Debug, Clone, Default)]
pub struct Session {
    cache: Arc<StatementCache>,
    config: SessionConfig,
}

impl Session {
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            cache: Arc::new(StatementCache::new()),
            config,
        }
    }

    #[must_use]
    pub const fn cache(&self) -> &Arc<StatementCache> {
        &self.cache
    }

    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// A repository for `T` on backend `DB`, sharing this session's cache. Attach hooks with
    /// [`Repository::with_hook`].
    #[must_use]
    pub fn repository<T, DB>(&self) -> Repository<T, DB>
    where
        T: Entity,
        DB: Dialect,
    {
        Repository::new(Arc::clone(&self.cache), self.config.clone())
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::{Session, SessionConfig};

    #[test]
    fn test_config_builder() {
        let config = SessionConfig::new()
            .with_statement_timeout(Duration::from_secs(2))
            .with_skip_hooks(true);

        assert_eq!(config.statement_timeout, Some(Duration::from_secs(2)));
        assert!(config.skip_hooks);
        assert_eq!(SessionConfig::default(), SessionConfig::new());
    }

    #[test]
    fn test_clones_share_the_cache() {
        let session = Session::default();
        let other = session.clone();

        assert!(std::sync::Arc::ptr_eq(session.cache(), other.cache()));
    }
}

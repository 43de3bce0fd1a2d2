use crate::{
    entity::Descriptor,
    error::{Error, Operation, Result},
};

/// Which columns take part in an insert or update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Columns {
    /// Write the columns without a default, plus any defaulted column the caller has set to a
    /// non-zero value. For updates, write everything except the primary key and immutable
    /// columns.
    #[default]
    Infer,
    /// Write exactly these columns.
    Whitelist(Vec<&'static str>),
    /// Infer, then leave out these columns.
    Blacklist(Vec<&'static str>),
    /// Infer, then always add these columns.
    Greylist(Vec<&'static str>),
}

fn has(list: &[&str], column: &str) -> bool {
    list.iter().any(|e| *e == column)
}

impl Columns {
    #[must_use]
    pub const fn infer() -> Self {
        Self::Infer
    }

    pub fn whitelist(columns: impl IntoIterator<Item = &'static str>) -> Self {
        Self::Whitelist(columns.into_iter().collect())
    }

    pub fn blacklist(columns: impl IntoIterator<Item = &'static str>) -> Self {
        Self::Blacklist(columns.into_iter().collect())
    }

    pub fn greylist(columns: impl IntoIterator<Item = &'static str>) -> Self {
        Self::Greylist(columns.into_iter().collect())
    }

    /// A stable textual form of the policy, part of every statement cache key.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        match self {
            Self::Infer => "infer".to_string(),
            Self::Whitelist(e) => format!("whitelist:{}", e.join(",")),
            Self::Blacklist(e) => format!("blacklist:{}", e.join(",")),
            Self::Greylist(e) => format!("greylist:{}", e.join(",")),
        }
    }

    /// Split the table's columns into the ones written by an insert and the ones read back
    /// from the database afterwards. Both lists follow the table's column order.
    ///
    /// `non_zero_defaults` are the defaulted columns the entity holds a non-zero value for.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyColumnSet`] if a whitelist leaves nothing to write on a table that has
    /// columns without a default. Any other policy may produce an empty write list, which
    /// inserts a row of defaults.
    pub fn insert_column_set(
        &self,
        descriptor: &Descriptor,
        non_zero_defaults: &[&str],
    ) -> Result<(Vec<&'static str>, Vec<&'static str>)> {
        let inferred = |column: &str| {
            has(descriptor.without_default, column) || has(non_zero_defaults, column)
        };

        let write = descriptor
            .columns
            .iter()
            .copied()
            .filter(|e| !has(descriptor.generated, e))
            .filter(|e| match self {
                Self::Infer => inferred(e),
                Self::Whitelist(list) => has(list, e),
                Self::Blacklist(list) => inferred(e) && !has(list, e),
                Self::Greylist(list) => inferred(e) || has(list, e),
            })
            .collect::<Vec<_>>();

        if write.is_empty()
            && matches!(self, Self::Whitelist(_))
            && !descriptor.without_default.is_empty()
        {
            return Err(Error::EmptyColumnSet {
                table: descriptor.table,
                operation: Operation::Insert,
            });
        }

        let returning = descriptor
            .columns
            .iter()
            .copied()
            .filter(|e| !write.contains(e))
            .collect();

        Ok((write, returning))
    }

    /// The columns written by an update, in table order. Primary key and generated columns are
    /// never part of it. May be empty.
    #[must_use]
    pub fn update_candidates(&self, descriptor: &Descriptor) -> Vec<&'static str> {
        descriptor
            .columns
            .iter()
            .copied()
            .filter(|e| !has(descriptor.primary_key, e) && !has(descriptor.generated, e))
            .filter(|e| match self {
                Self::Infer => !has(descriptor.immutable, e),
                Self::Whitelist(list) => has(list, e),
                Self::Blacklist(list) => !has(descriptor.immutable, e) && !has(list, e),
                Self::Greylist(list) => !has(descriptor.immutable, e) || has(list, e),
            })
            .collect()
    }

    /// Like [`Self::update_candidates`], but an update without columns is an error.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyColumnSet`] if the policy leaves nothing to write.
    pub fn update_column_set(&self, descriptor: &Descriptor) -> Result<Vec<&'static str>> {
        let write = self.update_candidates(descriptor);

        if write.is_empty() {
            return Err(Error::EmptyColumnSet {
                table: descriptor.table,
                operation: Operation::Update,
            });
        }

        Ok(write)
    }
}

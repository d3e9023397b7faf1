//! "At most one flagged row per owner" designations.

use parishdesk_core::{AppError, AppResult};

/// Boolean columns that may be set on at most one row per owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExclusiveFlag {
    /// `users.is_tenant_owner`, exclusive per tenant.
    TenantOwner,
}

impl ExclusiveFlag {
    /// Table holding the flag.
    #[must_use]
    pub fn table(&self) -> &'static str {
        match self {
            Self::TenantOwner => "users",
        }
    }

    /// Column grouping rows by owner.
    #[must_use]
    pub fn owner_column(&self) -> &'static str {
        match self {
            Self::TenantOwner => "tenant_id",
        }
    }

    /// Flag column.
    #[must_use]
    pub fn flag_column(&self) -> &'static str {
        match self {
            Self::TenantOwner => "is_tenant_owner",
        }
    }

    /// Primary key column of the table.
    #[must_use]
    pub fn key_column(&self) -> &'static str {
        match self {
            Self::TenantOwner => "id",
        }
    }

    /// Returns a stable label for messages.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TenantOwner => "tenant owner",
        }
    }
}

/// Row carrying an exclusive flag.
pub trait FlaggedRow {
    /// Owner grouping type.
    type Owner: PartialEq;
    /// Row key type.
    type Key: PartialEq;

    /// Owner of the row.
    fn owner(&self) -> Option<Self::Owner>;
    /// Key of the row.
    fn key(&self) -> Self::Key;
    /// Stores the flag value.
    fn set_flag(&mut self, flag: ExclusiveFlag, value: bool);
}

/// Flags `key` and clears the flag on every other row of `owner`.
///
/// Fails with `NotFound` when `key` is not a row of `owner`; rows are left
/// untouched in that case.
pub fn designate<'a, R>(
    rows: impl IntoIterator<Item = &'a mut R>,
    flag: ExclusiveFlag,
    owner: &R::Owner,
    key: &R::Key,
) -> AppResult<()>
where
    R: FlaggedRow + 'a,
{
    let mut group: Vec<&mut R> = rows
        .into_iter()
        .filter(|row| row.owner().as_ref() == Some(owner))
        .collect();

    if !group.iter().any(|row| row.key() == *key) {
        return Err(AppError::NotFound(format!(
            "{} candidate does not belong to the owner",
            flag.as_str()
        )));
    }

    for row in &mut group {
        let selected = row.key() == *key;
        row.set_flag(flag, selected);
    }

    Ok(())
}

/// Persistent entities and their repository operations.
///
/// - [`user`]: accounts, roles and single-use account tokens
/// - [`contact`], [`lead`], [`task`]: owner-scoped CRM records
///
/// By-id operations on owned records take an [`OwnerScope`]. A record outside
/// the caller's scope behaves exactly like a missing one (`None` / `false`), so
/// the HTTP layer answers 404 and never confirms another owner's record exists.

use sqlx::{Postgres, QueryBuilder};

pub mod contact;
pub mod lead;
pub mod task;
pub mod user;

/// Which rows a by-id operation may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerScope {
    /// Only rows whose `owner_id` matches
    Owner(i64),
    /// Any row (administrators)
    Any,
}

impl OwnerScope {
    /// Appends `AND owner_id = $n` for [`OwnerScope::Owner`].
    pub(crate) fn push_predicate(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        if let OwnerScope::Owner(owner_id) = *self {
            qb.push(" AND owner_id = ").push_bind(owner_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Execute;

    #[test]
    fn test_owner_scope_predicate() {
        let mut qb = QueryBuilder::<Postgres>::new("DELETE FROM leads WHERE id = ");
        qb.push_bind(1_i64);
        OwnerScope::Owner(5).push_predicate(&mut qb);
        assert_eq!(qb.build().sql(), "DELETE FROM leads WHERE id = $1 AND owner_id = $2");
    }

    #[test]
    fn test_any_scope_adds_nothing() {
        let mut qb = QueryBuilder::<Postgres>::new("DELETE FROM leads WHERE id = ");
        qb.push_bind(1_i64);
        OwnerScope::Any.push_predicate(&mut qb);
        assert_eq!(qb.build().sql(), "DELETE FROM leads WHERE id = $1");
    }
}

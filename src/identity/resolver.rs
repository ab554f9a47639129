// src/identity/resolver.rs
//! Session-scoped identity resolver
//!
//! Permitted subjects always resolve to their public id. Everyone else gets
//! the next anonymous id on first sight, cached for the rest of the session.
//! A new resolver is created per session, so anonymous ids do not carry
//! across matches.

use crate::identity::{Allowlist, DurableId};
use std::collections::HashMap;
use std::sync::Arc;

/// Maps durable identifiers to loggable subject ids for one session
pub struct IdentityResolver {
    allowlist: Arc<Allowlist>,
    anonymous: HashMap<DurableId, i32>,
    next_anonymous: i32,
}

impl IdentityResolver {
    pub fn new(allowlist: Arc<Allowlist>) -> Self {
        Self {
            allowlist,
            anonymous: HashMap::new(),
            next_anonymous: 0,
        }
    }

    /// Loggable subject id, assigning an anonymous id on first sight
    pub fn resolve(&mut self, id: &DurableId) -> i32 {
        if let Some(public_id) = self.allowlist.public_id(id) {
            return public_id;
        }

        if let Some(anonymous_id) = self.anonymous.get(id) {
            return *anonymous_id;
        }

        let anonymous_id = self.next_anonymous;
        self.next_anonymous += 1;
        self.anonymous.insert(*id, anonymous_id);
        anonymous_id
    }

    /// Subject id without assigning a new anonymous id
    pub fn peek(&self, id: &DurableId) -> Option<i32> {
        self.allowlist
            .public_id(id)
            .or_else(|| self.anonymous.get(id).copied())
    }

    /// Number of anonymous ids handed out this session
    pub fn anonymous_count(&self) -> usize {
        self.anonymous.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn allowlist_with(entries: &[(u128, i32)]) -> Arc<Allowlist> {
        let allowlist = Allowlist::empty();
        allowlist.replace(
            entries
                .iter()
                .map(|(id, public_id)| (DurableId::from_u128(*id), *public_id))
                .collect(),
        );
        Arc::new(allowlist)
    }

    #[test]
    fn test_anonymous_ids_in_first_seen_order() {
        let mut resolver = IdentityResolver::new(Arc::new(Allowlist::empty()));
        let a = DurableId::from_u128(10);
        let b = DurableId::from_u128(20);
        let c = DurableId::from_u128(30);

        assert_eq!(resolver.resolve(&b), 0);
        assert_eq!(resolver.resolve(&a), 1);
        assert_eq!(resolver.resolve(&b), 0);
        assert_eq!(resolver.resolve(&c), 2);
        assert_eq!(resolver.anonymous_count(), 3);
    }

    #[test]
    fn test_permitted_subject_uses_public_id() {
        let permitted = DurableId::from_u128(1);
        let mut resolver = IdentityResolver::new(allowlist_with(&[(1, 7)]));

        assert_eq!(resolver.resolve(&DurableId::from_u128(2)), 0);
        assert_eq!(resolver.resolve(&permitted), 7);
        assert_eq!(resolver.resolve(&permitted), 7);
        assert_eq!(resolver.resolve(&DurableId::from_u128(3)), 1);
        assert_eq!(resolver.anonymous_count(), 2);
    }

    #[test]
    fn test_peek_has_no_side_effects() {
        let mut resolver = IdentityResolver::new(Arc::new(Allowlist::empty()));
        let id = DurableId::from_u128(5);

        assert_eq!(resolver.peek(&id), None);
        assert_eq!(resolver.anonymous_count(), 0);
        assert_eq!(resolver.resolve(&id), 0);
        assert_eq!(resolver.peek(&id), Some(0));
    }

    #[test]
    fn test_new_session_restarts_anonymous_ids() {
        let allowlist = Arc::new(Allowlist::empty());
        let a = DurableId::from_u128(10);
        let b = DurableId::from_u128(20);

        let mut first = IdentityResolver::new(Arc::clone(&allowlist));
        first.resolve(&a);
        first.resolve(&b);

        let mut second = IdentityResolver::new(allowlist);
        assert_eq!(second.resolve(&b), 0);
    }

    proptest! {
        #[test]
        fn prop_distinct_subjects_never_share_anonymous_id(
            ids in proptest::collection::vec(1u128..50, 1..200)
        ) {
            let mut resolver = IdentityResolver::new(Arc::new(Allowlist::empty()));
            let mut assigned: HashMap<u128, i32> = HashMap::new();

            for raw in &ids {
                let subject = resolver.resolve(&DurableId::from_u128(*raw));
                let first = *assigned.entry(*raw).or_insert(subject);
                prop_assert_eq!(first, subject);
            }

            let distinct: HashSet<i32> = assigned.values().copied().collect();
            prop_assert_eq!(distinct.len(), assigned.len());
            prop_assert_eq!(resolver.anonymous_count(), assigned.len());
            prop_assert!(assigned.values().all(|v| (*v as usize) < assigned.len()));
        }
    }
}

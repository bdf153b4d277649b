//! Live group subscriptions.
//!
//! Group id → users currently subscribed on their live connection. This is
//! not membership: the set is rebuilt from explicit `join_group` actions on
//! every connection and is never loaded from storage.
//!
//! Both directions are kept under one mutex so teardown can drop a user from
//! all of their groups without scanning every group.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
struct Index {
    by_group: HashMap<String, HashSet<String>>,
    by_user: HashMap<String, HashSet<String>>,
}

impl Index {
    fn remove(&mut self, user_id: &str, group_id: &str) -> bool {
        let Some(members) = self.by_group.get_mut(group_id) else {
            return false;
        };
        let removed = members.remove(user_id);
        if members.is_empty() {
            self.by_group.remove(group_id);
        }
        if let Some(groups) = self.by_user.get_mut(user_id) {
            groups.remove(group_id);
            if groups.is_empty() {
                self.by_user.remove(user_id);
            }
        }
        removed
    }
}

#[derive(Debug, Default)]
pub struct GroupSubscriptions {
    inner: Mutex<Index>,
}

impl GroupSubscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `user_id` to `group_id`. Returns false if already subscribed.
    pub fn subscribe(&self, user_id: &str, group_id: &str) -> bool {
        self.subscribe_if(user_id, group_id, || true)
    }

    /// Subscribe only if `still_valid` holds, evaluated under the lock.
    ///
    /// Teardown takes the same lock to unsubscribe, so a join racing with
    /// disconnect either fails the check or is undone by the teardown.
    pub fn subscribe_if(
        &self,
        user_id: &str,
        group_id: &str,
        still_valid: impl FnOnce() -> bool,
    ) -> bool {
        let mut index = self.inner.lock();
        if !still_valid() {
            return false;
        }
        let added = index
            .by_group
            .entry(group_id.to_string())
            .or_default()
            .insert(user_id.to_string());
        index
            .by_user
            .entry(user_id.to_string())
            .or_default()
            .insert(group_id.to_string());
        added
    }

    /// Drop one subscription. Returns whether it existed.
    pub fn unsubscribe(&self, user_id: &str, group_id: &str) -> bool {
        self.unsubscribe_if(user_id, group_id, || true)
    }

    /// Drop one subscription only if `still_valid` holds under the lock.
    pub fn unsubscribe_if(
        &self,
        user_id: &str,
        group_id: &str,
        still_valid: impl FnOnce() -> bool,
    ) -> bool {
        let mut index = self.inner.lock();
        still_valid() && index.remove(user_id, group_id)
    }

    /// Drop every subscription of `user_id`, removing groups left empty.
    /// Returns the groups the user was in.
    pub fn unsubscribe_all(&self, user_id: &str) -> Vec<String> {
        self.unsubscribe_all_if(user_id, || true).unwrap_or_default()
    }

    /// Like [`unsubscribe_all`](Self::unsubscribe_all), but only if `cond`
    /// holds when evaluated under the lock. `None` if it did not.
    pub fn unsubscribe_all_if(
        &self,
        user_id: &str,
        cond: impl FnOnce() -> bool,
    ) -> Option<Vec<String>> {
        let mut index = self.inner.lock();
        if !cond() {
            return None;
        }
        let Some(groups) = index.by_user.remove(user_id) else {
            return Some(Vec::new());
        };
        for group_id in &groups {
            if let Some(members) = index.by_group.get_mut(group_id) {
                members.remove(user_id);
                if members.is_empty() {
                    index.by_group.remove(group_id);
                }
            }
        }
        Some(groups.into_iter().collect())
    }

    /// Snapshot of the users subscribed to `group_id`.
    pub fn members_of(&self, group_id: &str) -> Vec<String> {
        self.inner
            .lock()
            .by_group
            .get(group_id)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether anyone is subscribed to `group_id`.
    pub fn has_group(&self, group_id: &str) -> bool {
        self.inner.lock().by_group.contains_key(group_id)
    }

    /// Groups `user_id` is subscribed to.
    pub fn groups_of(&self, user_id: &str) -> Vec<String> {
        self.inner
            .lock()
            .by_user
            .get(user_id)
            .map(|g| g.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Remove a group's live set entirely, returning who was in it.
    pub fn dismiss(&self, group_id: &str) -> Vec<String> {
        let mut index = self.inner.lock();
        let Some(members) = index.by_group.remove(group_id) else {
            return Vec::new();
        };
        for user_id in &members {
            if let Some(groups) = index.by_user.get_mut(user_id) {
                groups.remove(group_id);
                if groups.is_empty() {
                    index.by_user.remove(user_id);
                }
            }
        }
        members.into_iter().collect()
    }

    pub fn group_count(&self) -> usize {
        self.inner.lock().by_group.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(mut v: Vec<String>) -> Vec<String> {
        v.sort();
        v
    }

    #[test]
    fn subscribe_creates_set_once() {
        let subs = GroupSubscriptions::new();
        assert!(subs.subscribe("U1", "G1"));
        assert!(!subs.subscribe("U1", "G1"));
        assert!(subs.subscribe("U2", "G1"));

        assert_eq!(sorted(subs.members_of("G1")), ["U1", "U2"]);
        assert!(subs.members_of("G2").is_empty());
        assert!(subs.has_group("G1"));
    }

    #[test]
    fn unsubscribe_all_removes_empty_sets() {
        let subs = GroupSubscriptions::new();
        subs.subscribe("U1", "G1");
        subs.subscribe("U1", "G2");
        subs.subscribe("U2", "G1");

        assert_eq!(sorted(subs.unsubscribe_all("U1")), ["G1", "G2"]);

        assert_eq!(subs.members_of("G1"), ["U2"]);
        assert!(!subs.has_group("G2"));
        assert_eq!(subs.group_count(), 1);
        assert!(subs.groups_of("U1").is_empty());
        assert!(subs.unsubscribe_all("U1").is_empty());
    }

    #[test]
    fn unsubscribe_single_group() {
        let subs = GroupSubscriptions::new();
        subs.subscribe("U1", "G1");
        subs.subscribe("U1", "G2");

        assert!(subs.unsubscribe("U1", "G1"));
        assert!(!subs.unsubscribe("U1", "G1"));
        assert!(!subs.has_group("G1"));
        assert_eq!(subs.groups_of("U1"), ["G2"]);
    }

    #[test]
    fn dismiss_clears_both_directions() {
        let subs = GroupSubscriptions::new();
        subs.subscribe("U1", "G1");
        subs.subscribe("U2", "G1");
        subs.subscribe("U2", "G2");

        assert_eq!(sorted(subs.dismiss("G1")), ["U1", "U2"]);
        assert!(subs.groups_of("U1").is_empty());
        assert_eq!(subs.groups_of("U2"), ["G2"]);
        assert!(subs.dismiss("G1").is_empty());
    }

    #[test]
    fn subscribe_if_respects_predicate() {
        let subs = GroupSubscriptions::new();
        assert!(!subs.subscribe_if("U1", "G1", || false));
        assert!(!subs.has_group("G1"));
        assert!(subs.subscribe_if("U1", "G1", || true));
    }

    #[test]
    fn unsubscribe_if_respects_predicate() {
        let subs = GroupSubscriptions::new();
        subs.subscribe("U1", "G1");
        assert!(!subs.unsubscribe_if("U1", "G1", || false));
        assert_eq!(subs.members_of("G1"), ["U1"]);
        assert!(subs.unsubscribe_if("U1", "G1", || true));
        assert!(!subs.has_group("G1"));
    }
}

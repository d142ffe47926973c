//! Actor addresses
//!
//! A [`Pid`] is a cheap-to-clone value naming a logical actor. It never owns
//! actor state; delivery always goes through the [`ProcessRegistry`], which
//! may short-circuit the lookup with a cached weak reference stored in the
//! PID itself.
//!
//! [`ProcessRegistry`]: crate::registry::ProcessRegistry

use crate::process::Process;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

/// Address of a logical actor: `(address, id)`.
///
/// Equality and hashing consider only the address and id; the process cache
/// is shared between clones and ignored by comparisons.
#[derive(Clone)]
pub struct Pid {
    address: Arc<str>,
    id: Arc<str>,
    cache: Arc<RwLock<Option<Weak<dyn Process>>>>,
}

impl Pid {
    pub fn new(address: impl Into<Arc<str>>, id: impl Into<Arc<str>>) -> Self {
        Self {
            address: address.into(),
            id: id.into(),
            cache: Arc::new(RwLock::new(None)),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Cached process, if it is still alive and has not reported itself dead
    pub(crate) fn cached_process(&self) -> Option<Arc<dyn Process>> {
        let cached = self.cache.read();
        let process = cached.as_ref()?.upgrade()?;
        if process.is_dead() {
            drop(cached);
            self.clear_cache();
            return None;
        }
        Some(process)
    }

    pub(crate) fn cache_process(&self, process: &Arc<dyn Process>) {
        *self.cache.write() = Some(Arc::downgrade(process));
    }

    pub(crate) fn clear_cache(&self) {
        *self.cache.write() = None;
    }
}

impl PartialEq for Pid {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.address == other.address
    }
}

impl Eq for Pid {}

impl Hash for Pid {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
        self.id.hash(state);
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.id)
    }
}

impl fmt::Debug for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pid")
            .field("address", &self.address)
            .field("id", &self.id)
            .finish()
    }
}

/// Insertion-ordered set of PIDs with O(1) membership checks.
///
/// Used for an actor's children, watchers and watched actors. Only the
/// owning actor's context mutates it.
#[derive(Debug, Default, Clone)]
pub struct PidSet {
    pids: Vec<Pid>,
    index: HashMap<Pid, usize>,
}

impl PidSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the PID was already present
    pub fn add(&mut self, pid: Pid) -> bool {
        if self.index.contains_key(&pid) {
            return false;
        }
        self.index.insert(pid.clone(), self.pids.len());
        self.pids.push(pid);
        true
    }

    /// Returns false if the PID was not present
    pub fn remove(&mut self, pid: &Pid) -> bool {
        let Some(position) = self.index.remove(pid) else {
            return false;
        };
        self.pids.swap_remove(position);
        if let Some(moved) = self.pids.get(position) {
            self.index.insert(moved.clone(), position);
        }
        true
    }

    pub fn contains(&self, pid: &Pid) -> bool {
        self.index.contains_key(pid)
    }

    pub fn len(&self) -> usize {
        self.pids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pid> {
        self.pids.iter()
    }

    pub fn to_vec(&self) -> Vec<Pid> {
        self.pids.clone()
    }

    pub fn clear(&mut self) {
        self.pids.clear();
        self.index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_pid_display() {
        let pid = Pid::new("nonhost", "$1/child");
        assert_eq!(pid.to_string(), "nonhost/$1/child");
        assert_eq!(pid.address(), "nonhost");
        assert_eq!(pid.id(), "$1/child");
    }

    #[test]
    fn test_pid_equality_ignores_cache() {
        let a = Pid::new("nonhost", "a");
        let b = Pid::new("nonhost", "a");
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
        assert_ne!(b, Pid::new("remote", "a"));
    }

    #[test]
    fn test_pid_set_add_remove() {
        let mut set = PidSet::new();
        let a = Pid::new("nonhost", "a");
        let b = Pid::new("nonhost", "b");
        let c = Pid::new("nonhost", "c");

        assert!(set.add(a.clone()));
        assert!(set.add(b.clone()));
        assert!(set.add(c.clone()));
        assert!(!set.add(a.clone()));
        assert_eq!(set.len(), 3);

        assert!(set.remove(&a));
        assert!(!set.remove(&a));
        assert!(!set.contains(&a));
        assert!(set.contains(&b));
        assert!(set.contains(&c));

        // index stays consistent after swap_remove
        assert!(set.remove(&c));
        assert!(set.remove(&b));
        assert!(set.is_empty());
    }

    #[test]
    fn test_pid_set_preserves_order_until_removal() {
        let mut set = PidSet::new();
        for i in 0..4 {
            set.add(Pid::new("nonhost", format!("{i}")));
        }
        let ids: Vec<_> = set.iter().map(|p| p.id().to_string()).collect();
        assert_eq!(ids, vec!["0", "1", "2", "3"]);
    }
}

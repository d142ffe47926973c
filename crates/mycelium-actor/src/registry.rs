//! Process registry
//!
//! Maps local ids to [`Process`]es. The map is sharded (one lock per shard)
//! so spawn/stop churn on unrelated actors does not contend. Lookups for
//! non-local addresses are delegated to registered [`AddressResolver`]s.

use crate::pid::Pid;
use crate::process::Process;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Resolves PIDs whose address is not the local one
pub type AddressResolver = Arc<dyn Fn(&Pid) -> Option<Arc<dyn Process>> + Send + Sync>;

const ID_DIGITS: &[u8; 64] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ~+";

pub struct ProcessRegistry {
    address: Arc<str>,
    local: DashMap<Arc<str>, Arc<dyn Process>>,
    resolvers: RwLock<Vec<AddressResolver>>,
    sequence: AtomicU64,
    dead_letter: Arc<dyn Process>,
}

impl ProcessRegistry {
    /// `shards` must be a power of two greater than one
    pub fn new(address: impl Into<Arc<str>>, shards: usize, dead_letter: Arc<dyn Process>) -> Self {
        Self {
            address: address.into(),
            local: DashMap::with_shard_amount(shards),
            resolvers: RwLock::new(Vec::new()),
            sequence: AtomicU64::new(0),
            dead_letter,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Next compact anonymous id: `$` followed by the base-64 counter
    pub fn next_id(&self) -> String {
        let counter = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        format!("${}", encode_id(counter))
    }

    /// Register a process under `id`.
    ///
    /// Returns the PID and whether it was accepted; `false` means the name
    /// was already taken and the returned PID belongs to the existing process.
    pub fn add(&self, process: Arc<dyn Process>, id: &str) -> (Pid, bool) {
        let pid = Pid::new(self.address.clone(), id);
        match self.local.entry(Arc::from(id)) {
            Entry::Occupied(_) => (pid, false),
            Entry::Vacant(slot) => {
                pid.cache_process(&process);
                slot.insert(process);
                (pid, true)
            }
        }
    }

    /// Remove a process; removing an absent PID is a no-op
    pub fn remove(&self, pid: &Pid) {
        if let Some((_, process)) = self.local.remove(pid.id()) {
            process.mark_dead();
        }
        pid.clear_cache();
    }

    /// Resolve a PID, falling back to the dead-letter process
    pub fn get(&self, pid: &Pid) -> Arc<dyn Process> {
        if let Some(process) = pid.cached_process() {
            return process;
        }

        if pid.address() != &*self.address {
            return self
                .resolve_remote(pid)
                .unwrap_or_else(|| self.dead_letter.clone());
        }

        match self.local.get(pid.id()) {
            Some(entry) => {
                let process = entry.value().clone();
                pid.cache_process(&process);
                process
            }
            None => self.dead_letter.clone(),
        }
    }

    /// Resolve a local id without touching any PID cache
    pub fn get_local(&self, id: &str) -> Option<Arc<dyn Process>> {
        self.local.get(id).map(|entry| entry.value().clone())
    }

    pub fn register_address_resolver(&self, resolver: AddressResolver) {
        self.resolvers.write().push(resolver);
    }

    /// Ids of every locally registered process
    pub fn local_ids(&self) -> Vec<String> {
        self.local.iter().map(|entry| entry.key().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.local.len()
    }

    pub fn is_empty(&self) -> bool {
        self.local.is_empty()
    }

    fn resolve_remote(&self, pid: &Pid) -> Option<Arc<dyn Process>> {
        let resolvers = self.resolvers.read();
        resolvers.iter().find_map(|resolve| resolve(pid))
    }
}

fn encode_id(mut value: u64) -> String {
    let mut digits = [0u8; 11];
    let mut position = digits.len();
    loop {
        position -= 1;
        digits[position] = ID_DIGITS[(value & 0x3f) as usize];
        value >>= 6;
        if value == 0 {
            break;
        }
    }
    digits[position..].iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MessageEnvelope, SystemMessage};
    use parking_lot::Mutex;
    use std::collections::HashSet;

    #[derive(Default)]
    struct Recorder {
        user: Mutex<Vec<String>>,
    }

    impl Process for Recorder {
        fn send_user_message(&self, pid: &Pid, _envelope: MessageEnvelope) {
            self.user.lock().push(pid.id().to_string());
        }

        fn send_system_message(&self, _pid: &Pid, _message: SystemMessage) {}

        fn stop(&self, _pid: &Pid) {}
    }

    fn registry() -> (ProcessRegistry, Arc<Recorder>) {
        let dead_letter = Arc::new(Recorder::default());
        (
            ProcessRegistry::new("nonhost", 16, dead_letter.clone()),
            dead_letter,
        )
    }

    #[test]
    fn test_encode_id() {
        assert_eq!(encode_id(0), "0");
        assert_eq!(encode_id(1), "1");
        assert_eq!(encode_id(63), "+");
        assert_eq!(encode_id(64), "10");
        assert_eq!(encode_id(u64::MAX).len(), 11);
    }

    #[test]
    fn test_next_id_unique() {
        let (registry, _) = registry();
        let ids: HashSet<_> = (0..10_000).map(|_| registry.next_id()).collect();
        assert_eq!(ids.len(), 10_000);
        assert!(ids.iter().all(|id| id.starts_with('$')));
    }

    #[test]
    fn test_add_rejects_duplicate_names() {
        let (registry, _) = registry();
        let (pid, added) = registry.add(Arc::new(Recorder::default()), "worker");
        assert!(added);
        assert_eq!(pid, Pid::new("nonhost", "worker"));

        let (existing, added) = registry.add(Arc::new(Recorder::default()), "worker");
        assert!(!added);
        assert_eq!(existing, pid);
    }

    #[test]
    fn test_remove_is_idempotent_and_routes_to_dead_letter() {
        let (registry, dead_letter) = registry();
        let (pid, _) = registry.add(Arc::new(Recorder::default()), "worker");

        registry.remove(&pid);
        registry.remove(&pid);
        assert!(registry.is_empty());

        let process = registry.get(&pid);
        process.send_user_message(&pid, MessageEnvelope::new(crate::Message::from_any(1u8)));
        assert_eq!(dead_letter.user.lock().as_slice(), ["worker"]);
    }

    #[test]
    fn test_address_resolver() {
        let (registry, dead_letter) = registry();
        let remote = Arc::new(Recorder::default());
        let target = remote.clone();
        registry.register_address_resolver(Arc::new(move |pid: &Pid| {
            (pid.address() == "node-b").then(|| target.clone() as Arc<dyn Process>)
        }));

        let pid = Pid::new("node-b", "svc");
        registry
            .get(&pid)
            .send_user_message(&pid, MessageEnvelope::new(crate::Message::Started));
        assert_eq!(remote.user.lock().len(), 1);

        let unknown = Pid::new("node-c", "svc");
        registry
            .get(&unknown)
            .send_user_message(&unknown, MessageEnvelope::new(crate::Message::Started));
        assert_eq!(dead_letter.user.lock().len(), 1);
    }
}

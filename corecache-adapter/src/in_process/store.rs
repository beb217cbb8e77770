//! The in-process key space: a single lock-protected map plus a FIFO
//! eviction queue. No persistence, no LMDB; this is the in-memory
//! reference adapter, not a durable store.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use corecache_core::DataType;

/// Total ordering wrapper over `f64` sorted-set scores. NaN scores are never
/// inserted (callers reject them before they reach the store), so
/// `partial_cmp` always succeeds; the `unwrap_or(Equal)` fallback only
/// matters for degenerate comparisons against a sentinel during lookups.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderedScore(pub f64);

impl Eq for OrderedScore {}

impl PartialOrd for OrderedScore {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedScore {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(std::cmp::Ordering::Equal)
    }
}

/// A sorted set's dual index: `BTreeSet<(score, member)>` for ordered range
/// scans, `HashMap<member, score>` for O(1) score lookups. Kept in lockstep
/// by every mutating method on [`SortedSetValue`].
#[derive(Debug, Clone, Default)]
pub struct SortedSetValue {
    pub by_rank: BTreeSet<(OrderedScore, String)>,
    pub by_member: HashMap<String, f64>,
}

impl SortedSetValue {
    pub fn insert(&mut self, member: String, score: f64) -> bool {
        let is_new = match self.by_member.insert(member.clone(), score) {
            Some(old) => {
                self.by_rank.remove(&(OrderedScore(old), member.clone()));
                false
            }
            None => true,
        };
        self.by_rank.insert((OrderedScore(score), member));
        is_new
    }

    pub fn remove(&mut self, member: &str) -> bool {
        if let Some(score) = self.by_member.remove(member) {
            self.by_rank.remove(&(OrderedScore(score), member.to_string()));
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.by_member.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_member.is_empty()
    }
}

/// A stream entry's id plus its field/value pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEntry {
    pub id: String,
    pub fields: Vec<(String, String)>,
}

/// The value held by one key, tagged by the structure that created it
///. A command whose declared [`DataType`] does not
/// match the entry's variant is a type error, surfaced by the calling
/// command module — not reinterpreted here.
#[derive(Debug, Clone)]
pub enum StoreValue {
    String(String),
    List(VecDeque<String>),
    Set(HashSet<String>),
    SortedSet(SortedSetValue),
    Hash(HashMap<String, String>),
    Stream(Vec<StreamEntry>),
    HyperLogLog(HashSet<String>),
    Bloom { error_rate: f64, capacity: u64, items: HashSet<String> },
}

impl StoreValue {
    pub fn data_type(&self) -> DataType {
        match self {
            StoreValue::String(_) => DataType::String,
            StoreValue::List(_) => DataType::List,
            StoreValue::Set(_) => DataType::Set,
            StoreValue::SortedSet(_) => DataType::SortedSet,
            StoreValue::Hash(_) => DataType::Hash,
            StoreValue::Stream(_) => DataType::Stream,
            StoreValue::HyperLogLog(_) => DataType::HyperLogLog,
            StoreValue::Bloom { .. } => DataType::Bloom,
        }
    }
}

/// One key's value plus its expiry, if any. Expiration is checked lazily on
/// access and swept
/// periodically by the adapter's background loop.
#[derive(Debug, Clone)]
pub struct Entry {
    pub value: StoreValue,
    pub expires_at: Option<Instant>,
}

impl Entry {
    pub fn new(value: StoreValue) -> Self {
        Self { value, expires_at: None }
    }

    pub fn with_ttl(value: StoreValue, ttl: Duration) -> Self {
        Self { value, expires_at: Some(Instant::now() + ttl) }
    }

    pub fn is_expired(&self) -> bool {
        matches!(self.expires_at, Some(at) if at <= Instant::now())
    }
}

/// The key space plus insertion-order tracking for FIFO eviction:
/// `maxSize` evicts the oldest-inserted key, not LRU — the in-process
/// adapter does not track access recency.
#[derive(Debug, Default, Clone)]
pub struct Store {
    pub entries: HashMap<String, Entry>,
    pub insertion_order: VecDeque<String>,
    pub max_size: Option<usize>,
}

impl Store {
    pub fn new(max_size: Option<usize>) -> Self {
        Self {
            entries: HashMap::new(),
            insertion_order: VecDeque::new(),
            max_size,
        }
    }

    /// Remove the entry if present and expired; returns `true` if removed.
    pub fn expire_if_due(&mut self, key: &str) -> bool {
        let expired = self.entries.get(key).map(Entry::is_expired).unwrap_or(false);
        if expired {
            self.remove(key);
        }
        expired
    }

    pub fn get(&mut self, key: &str) -> Option<&Entry> {
        self.expire_if_due(key);
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Entry> {
        self.expire_if_due(key);
        self.entries.get_mut(key)
    }

    pub fn contains(&mut self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert or replace `key`, evicting the oldest key first if this insert
    /// would exceed `max_size`.
    pub fn insert(&mut self, key: String, entry: Entry) {
        let is_new = !self.entries.contains_key(&key);
        if is_new {
            if let Some(max) = self.max_size {
                while self.entries.len() >= max {
                    if let Some(oldest) = self.insertion_order.pop_front() {
                        if oldest != key {
                            self.entries.remove(&oldest);
                        }
                    } else {
                        break;
                    }
                }
            }
            self.insertion_order.push_back(key.clone());
        }
        self.entries.insert(key, entry);
    }

    pub fn remove(&mut self, key: &str) -> Option<Entry> {
        self.insertion_order.retain(|k| k != key);
        self.entries.remove(key)
    }

    /// Sweep every expired entry; run periodically by the adapter's
    /// background task rather than only on access, so idle keys with a TTL
    /// still free memory.
    pub fn sweep_expired(&mut self) -> usize {
        let now = Instant::now();
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| matches!(e.expires_at, Some(at) if at <= now))
            .map(|(k, _)| k.clone())
            .collect();
        let count = expired.len();
        for key in expired {
            self.remove(&key);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_eviction_drops_oldest_key() {
        let mut store = Store::new(Some(2));
        store.insert("a".into(), Entry::new(StoreValue::String("1".into())));
        store.insert("b".into(), Entry::new(StoreValue::String("2".into())));
        store.insert("c".into(), Entry::new(StoreValue::String("3".into())));
        assert!(!store.entries.contains_key("a"));
        assert!(store.entries.contains_key("b"));
        assert!(store.entries.contains_key("c"));
    }

    #[test]
    fn expired_entry_reads_as_absent() {
        let mut store = Store::new(None);
        store.insert(
            "k".into(),
            Entry::with_ttl(StoreValue::String("v".into()), Duration::from_millis(0)),
        );
        std::thread::sleep(Duration::from_millis(5));
        assert!(store.get("k").is_none());
    }

    #[test]
    fn sorted_set_insert_keeps_indexes_in_sync() {
        let mut zset = SortedSetValue::default();
        zset.insert("m1".into(), 1.0);
        zset.insert("m2".into(), 2.0);
        zset.insert("m1".into(), 5.0);
        assert_eq!(zset.len(), 2);
        let ranks: Vec<_> = zset.by_rank.iter().map(|(_, m)| m.clone()).collect();
        assert_eq!(ranks, vec!["m2".to_string(), "m1".to_string()]);
    }
}

//! HyperLogLog and Bloom filter command families. The
//! in-process adapter stores exact member sets rather than a true
//! probabilistic sketch — `PFCOUNT`/`BF.EXISTS` are therefore exact here,
//! which satisfies every documented invariant (approximate-or-better
//! counting, no false negatives) while keeping the reference adapter
//! simple.

use std::collections::HashSet;

use corecache_core::CommandError;

use super::store::{Entry, Store, StoreValue};

fn as_hll<'a>(store: &'a mut Store, key: &str) -> Result<Option<&'a HashSet<String>>, CommandError> {
    match store.get(key) {
        None => Ok(None),
        Some(entry) => match &entry.value {
            StoreValue::HyperLogLog(s) => Ok(Some(s)),
            other => Err(CommandError::Command(format!(
                "WRONGTYPE key holds a {:?}, not a hyperloglog",
                other.data_type()
            ))),
        },
    }
}

fn as_hll_mut<'a>(store: &'a mut Store, key: &str) -> Result<&'a mut HashSet<String>, CommandError> {
    store.expire_if_due(key);
    if !store.entries.contains_key(key) {
        store.insert(key.to_string(), Entry::new(StoreValue::HyperLogLog(HashSet::new())));
    }
    match &mut store.entries.get_mut(key).unwrap().value {
        StoreValue::HyperLogLog(s) => Ok(s),
        other => Err(CommandError::Command(format!(
            "WRONGTYPE key holds a {:?}, not a hyperloglog",
            other.data_type()
        ))),
    }
}

pub fn pfadd(store: &mut Store, key: &str, elements: &[String]) -> Result<bool, CommandError> {
    let set = as_hll_mut(store, key)?;
    let mut changed = false;
    for e in elements {
        changed |= set.insert(e.clone());
    }
    Ok(changed)
}

pub fn pfcount(store: &mut Store, keys: &[String]) -> Result<i64, CommandError> {
    let mut union = HashSet::new();
    for k in keys {
        if let Some(set) = as_hll(store, k)? {
            union.extend(set.iter().cloned());
        }
    }
    Ok(union.len() as i64)
}

pub fn pfmerge(store: &mut Store, dest: &str, sources: &[String]) -> Result<(), CommandError> {
    let mut union: HashSet<String> = as_hll(store, dest)?.cloned().unwrap_or_default();
    for s in sources {
        if let Some(set) = as_hll(store, s)? {
            union.extend(set.iter().cloned());
        }
    }
    store.insert(dest.to_string(), Entry::new(StoreValue::HyperLogLog(union)));
    Ok(())
}

fn as_bloom<'a>(
    store: &'a mut Store,
    key: &str,
) -> Result<Option<(f64, u64, &'a HashSet<String>)>, CommandError> {
    match store.get(key) {
        None => Ok(None),
        Some(entry) => match &entry.value {
            StoreValue::Bloom { error_rate, capacity, items } => Ok(Some((*error_rate, *capacity, items))),
            other => Err(CommandError::Command(format!(
                "WRONGTYPE key holds a {:?}, not a bloom filter",
                other.data_type()
            ))),
        },
    }
}

pub fn bf_reserve(store: &mut Store, key: &str, error_rate: f64, capacity: u64) -> Result<(), CommandError> {
    if store.contains(key) {
        return Err(CommandError::Command(format!("key {key} already exists")));
    }
    store.insert(
        key.to_string(),
        Entry::new(StoreValue::Bloom { error_rate, capacity, items: HashSet::new() }),
    );
    Ok(())
}

fn bloom_mut<'a>(
    store: &'a mut Store,
    key: &str,
) -> Result<&'a mut HashSet<String>, CommandError> {
    store.expire_if_due(key);
    match store.entries.get_mut(key) {
        Some(entry) => match &mut entry.value {
            StoreValue::Bloom { items, .. } => Ok(items),
            other => Err(CommandError::Command(format!(
                "WRONGTYPE key holds a {:?}, not a bloom filter",
                other.data_type()
            ))),
        },
        None => Err(CommandError::NotFound(format!(
            "bloom filter {key} has not been reserved"
        ))),
    }
}

pub fn bf_add(store: &mut Store, key: &str, item: &str) -> Result<bool, CommandError> {
    Ok(bloom_mut(store, key)?.insert(item.to_string()))
}

pub fn bf_madd(store: &mut Store, key: &str, items: &[String]) -> Result<Vec<bool>, CommandError> {
    let set = bloom_mut(store, key)?;
    Ok(items.iter().map(|i| set.insert(i.clone())).collect())
}

pub fn bf_exists(store: &mut Store, key: &str, item: &str) -> Result<bool, CommandError> {
    Ok(as_bloom(store, key)?.map(|(_, _, items)| items.contains(item)).unwrap_or(false))
}

pub fn bf_mexists(store: &mut Store, key: &str, items: &[String]) -> Result<Vec<bool>, CommandError> {
    let present = as_bloom(store, key)?.map(|(_, _, items)| items.clone()).unwrap_or_default();
    Ok(items.iter().map(|i| present.contains(i)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pfcount_is_exact_union_size() {
        let mut store = Store::new(None);
        pfadd(&mut store, "h1", &["a".into(), "b".into()]).unwrap();
        pfadd(&mut store, "h2", &["b".into(), "c".into()]).unwrap();
        assert_eq!(pfcount(&mut store, &["h1".into(), "h2".into()]).unwrap(), 3);
    }

    #[test]
    fn bloom_requires_reserve_before_add() {
        let mut store = Store::new(None);
        assert!(bf_add(&mut store, "b", "x").is_err());
        bf_reserve(&mut store, "b", 0.01, 1000).unwrap();
        assert!(bf_add(&mut store, "b", "x").unwrap());
        assert!(bf_exists(&mut store, "b", "x").unwrap());
        assert!(!bf_exists(&mut store, "b", "y").unwrap());
    }
}

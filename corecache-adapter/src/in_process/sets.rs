//! Set command family.

use std::collections::HashSet;

use corecache_core::CommandError;

use super::store::{Entry, Store, StoreValue};

fn as_set<'a>(store: &'a mut Store, key: &str) -> Result<Option<&'a HashSet<String>>, CommandError> {
    match store.get(key) {
        None => Ok(None),
        Some(entry) => match &entry.value {
            StoreValue::Set(s) => Ok(Some(s)),
            other => Err(CommandError::Command(format!(
                "WRONGTYPE key holds a {:?}, not a set",
                other.data_type()
            ))),
        },
    }
}

fn as_set_mut<'a>(store: &'a mut Store, key: &str) -> Result<&'a mut HashSet<String>, CommandError> {
    store.expire_if_due(key);
    if !store.entries.contains_key(key) {
        store.insert(key.to_string(), Entry::new(StoreValue::Set(HashSet::new())));
    }
    match &mut store.entries.get_mut(key).unwrap().value {
        StoreValue::Set(s) => Ok(s),
        other => Err(CommandError::Command(format!(
            "WRONGTYPE key holds a {:?}, not a set",
            other.data_type()
        ))),
    }
}

pub fn sadd(store: &mut Store, key: &str, members: &[String]) -> Result<i64, CommandError> {
    let set = as_set_mut(store, key)?;
    let mut added = 0;
    for m in members {
        if set.insert(m.clone()) {
            added += 1;
        }
    }
    Ok(added)
}

pub fn srem(store: &mut Store, key: &str, members: &[String]) -> Result<i64, CommandError> {
    if !store.contains(key) {
        return Ok(0);
    }
    let set = as_set_mut(store, key)?;
    let mut removed = 0;
    for m in members {
        if set.remove(m) {
            removed += 1;
        }
    }
    Ok(removed)
}

pub fn smembers(store: &mut Store, key: &str) -> Result<Vec<String>, CommandError> {
    Ok(as_set(store, key)?.map(|s| s.iter().cloned().collect()).unwrap_or_default())
}

pub fn sismember(store: &mut Store, key: &str, member: &str) -> Result<bool, CommandError> {
    Ok(as_set(store, key)?.map(|s| s.contains(member)).unwrap_or(false))
}

pub fn scard(store: &mut Store, key: &str) -> Result<i64, CommandError> {
    Ok(as_set(store, key)?.map(|s| s.len() as i64).unwrap_or(0))
}

fn collect_sets(store: &mut Store, keys: &[String]) -> Result<Vec<HashSet<String>>, CommandError> {
    keys.iter()
        .map(|k| Ok(as_set(store, k)?.cloned().unwrap_or_default()))
        .collect()
}

pub fn sinter(store: &mut Store, keys: &[String]) -> Result<Vec<String>, CommandError> {
    let sets = collect_sets(store, keys)?;
    let mut iter = sets.into_iter();
    let first = match iter.next() {
        Some(s) => s,
        None => return Ok(Vec::new()),
    };
    let result = iter.fold(first, |acc, s| acc.intersection(&s).cloned().collect());
    Ok(result.into_iter().collect())
}

pub fn sunion(store: &mut Store, keys: &[String]) -> Result<Vec<String>, CommandError> {
    let sets = collect_sets(store, keys)?;
    let mut result = HashSet::new();
    for s in sets {
        result.extend(s);
    }
    Ok(result.into_iter().collect())
}

pub fn sdiff(store: &mut Store, keys: &[String]) -> Result<Vec<String>, CommandError> {
    let sets = collect_sets(store, keys)?;
    let mut iter = sets.into_iter();
    let first = match iter.next() {
        Some(s) => s,
        None => return Ok(Vec::new()),
    };
    let result = iter.fold(first, |acc, s| acc.difference(&s).cloned().collect());
    Ok(result.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sinter_of_two_sets() {
        let mut store = Store::new(None);
        sadd(&mut store, "a", &["1".into(), "2".into(), "3".into()]).unwrap();
        sadd(&mut store, "b", &["2".into(), "3".into(), "4".into()]).unwrap();
        let mut result = sinter(&mut store, &["a".into(), "b".into()]).unwrap();
        result.sort();
        assert_eq!(result, vec!["2", "3"]);
    }

    #[test]
    fn sadd_counts_only_new_members() {
        let mut store = Store::new(None);
        assert_eq!(sadd(&mut store, "s", &["a".into(), "a".into()]).unwrap(), 1);
    }
}

//! Hash command family.

use std::collections::HashMap;

use corecache_core::CommandError;

use super::store::{Entry, Store, StoreValue};

fn as_hash<'a>(store: &'a mut Store, key: &str) -> Result<Option<&'a HashMap<String, String>>, CommandError> {
    match store.get(key) {
        None => Ok(None),
        Some(entry) => match &entry.value {
            StoreValue::Hash(h) => Ok(Some(h)),
            other => Err(CommandError::Command(format!(
                "WRONGTYPE key holds a {:?}, not a hash",
                other.data_type()
            ))),
        },
    }
}

fn as_hash_mut<'a>(store: &'a mut Store, key: &str) -> Result<&'a mut HashMap<String, String>, CommandError> {
    store.expire_if_due(key);
    if !store.entries.contains_key(key) {
        store.insert(key.to_string(), Entry::new(StoreValue::Hash(HashMap::new())));
    }
    match &mut store.entries.get_mut(key).unwrap().value {
        StoreValue::Hash(h) => Ok(h),
        other => Err(CommandError::Command(format!(
            "WRONGTYPE key holds a {:?}, not a hash",
            other.data_type()
        ))),
    }
}

pub fn hset(store: &mut Store, key: &str, field: &str, value: &str) -> Result<bool, CommandError> {
    let hash = as_hash_mut(store, key)?;
    Ok(hash.insert(field.to_string(), value.to_string()).is_none())
}

pub fn hmset(store: &mut Store, key: &str, fields: &[(String, String)]) -> Result<(), CommandError> {
    let hash = as_hash_mut(store, key)?;
    for (f, v) in fields {
        hash.insert(f.clone(), v.clone());
    }
    Ok(())
}

pub fn hget(store: &mut Store, key: &str, field: &str) -> Result<Option<String>, CommandError> {
    Ok(as_hash(store, key)?.and_then(|h| h.get(field).cloned()))
}

pub fn hgetall(store: &mut Store, key: &str) -> Result<Vec<(String, String)>, CommandError> {
    Ok(as_hash(store, key)?
        .map(|h| h.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default())
}

pub fn hmget(store: &mut Store, key: &str, fields: &[String]) -> Result<Vec<Option<String>>, CommandError> {
    let hash = as_hash(store, key)?;
    Ok(fields
        .iter()
        .map(|f| hash.and_then(|h| h.get(f).cloned()))
        .collect())
}

pub fn hdel(store: &mut Store, key: &str, fields: &[String]) -> Result<i64, CommandError> {
    if !store.contains(key) {
        return Ok(0);
    }
    let hash = as_hash_mut(store, key)?;
    let mut removed = 0;
    for f in fields {
        if hash.remove(f).is_some() {
            removed += 1;
        }
    }
    Ok(removed)
}

pub fn hexists(store: &mut Store, key: &str, field: &str) -> Result<bool, CommandError> {
    Ok(as_hash(store, key)?.map(|h| h.contains_key(field)).unwrap_or(false))
}

pub fn hincrby(store: &mut Store, key: &str, field: &str, delta: i64) -> Result<i64, CommandError> {
    let hash = as_hash_mut(store, key)?;
    let current: i64 = match hash.get(field) {
        Some(v) => v
            .parse()
            .map_err(|_| CommandError::Command("hash value is not an integer".into()))?,
        None => 0,
    };
    let next = current
        .checked_add(delta)
        .ok_or_else(|| CommandError::Command("increment would overflow i64".into()))?;
    hash.insert(field.to_string(), next.to_string());
    Ok(next)
}

pub fn hlen(store: &mut Store, key: &str) -> Result<i64, CommandError> {
    Ok(as_hash(store, key)?.map(|h| h.len() as i64).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hset_reports_new_vs_update() {
        let mut store = Store::new(None);
        assert!(hset(&mut store, "h", "f", "1").unwrap());
        assert!(!hset(&mut store, "h", "f", "2").unwrap());
    }

    #[test]
    fn hincrby_creates_field_at_zero() {
        let mut store = Store::new(None);
        assert_eq!(hincrby(&mut store, "h", "n", 3).unwrap(), 3);
    }
}

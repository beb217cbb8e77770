//! String command family. Each function takes the locked
//! [`Store`] and returns synchronously; the adapter's trait methods handle
//! locking and `async` plumbing.

use std::time::Duration;

use corecache_core::CommandError;

use super::store::{Entry, Store, StoreValue};
use crate::options::{SetOptions, SetOutcome};

fn as_string<'a>(store: &'a mut Store, key: &str) -> Result<Option<&'a String>, CommandError> {
    match store.get(key) {
        None => Ok(None),
        Some(entry) => match &entry.value {
            StoreValue::String(s) => Ok(Some(s)),
            other => Err(CommandError::Command(format!(
                "WRONGTYPE key holds a {:?}, not a string",
                other.data_type()
            ))),
        },
    }
}

pub fn set(store: &mut Store, key: &str, value: &str, opts: SetOptions) -> Result<SetOutcome, CommandError> {
    let exists = store.contains(key);
    if opts.nx && exists {
        return Ok(SetOutcome::Aborted);
    }
    if opts.xx && !exists {
        return Ok(SetOutcome::Aborted);
    }

    let ttl = if opts.keep_ttl {
        store.entries.get(key).and_then(|e| e.expires_at)
    } else if let Some(secs) = opts.ex {
        Some(std::time::Instant::now() + Duration::from_secs(secs))
    } else if let Some(ms) = opts.px {
        Some(std::time::Instant::now() + Duration::from_millis(ms))
    } else {
        None
    };

    store.insert(
        key.to_string(),
        Entry { value: StoreValue::String(value.to_string()), expires_at: ttl },
    );
    Ok(SetOutcome::Ok)
}

pub fn get(store: &mut Store, key: &str) -> Result<Option<String>, CommandError> {
    Ok(as_string(store, key)?.cloned())
}

pub fn mset(store: &mut Store, pairs: &[(String, String)]) -> Result<(), CommandError> {
    for (k, v) in pairs {
        store.insert(k.clone(), Entry::new(StoreValue::String(v.clone())));
    }
    Ok(())
}

pub fn mget(store: &mut Store, keys: &[String]) -> Result<Vec<Option<String>>, CommandError> {
    keys.iter().map(|k| get(store, k)).collect()
}

fn incr_decr(store: &mut Store, key: &str, delta: i64) -> Result<i64, CommandError> {
    let current: i64 = match as_string(store, key)? {
        Some(s) => s
            .parse()
            .map_err(|_| CommandError::Command("value is not an integer".into()))?,
        None => 0,
    };
    let next = current
        .checked_add(delta)
        .ok_or_else(|| CommandError::Command("increment would overflow i64".into()))?;
    let ttl = store.entries.get(key).and_then(|e| e.expires_at);
    store.insert(key.to_string(), Entry { value: StoreValue::String(next.to_string()), expires_at: ttl });
    Ok(next)
}

pub fn incr_by(store: &mut Store, key: &str, delta: i64) -> Result<i64, CommandError> {
    incr_decr(store, key, delta)
}

pub fn decr_by(store: &mut Store, key: &str, delta: i64) -> Result<i64, CommandError> {
    incr_decr(store, key, -delta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_nx_aborts_when_key_present() {
        let mut store = Store::new(None);
        set(&mut store, "k", "v1", SetOptions::default()).unwrap();
        let outcome = set(&mut store, "k", "v2", SetOptions { nx: true, ..Default::default() }).unwrap();
        assert_eq!(outcome, SetOutcome::Aborted);
        assert_eq!(get(&mut store, "k").unwrap(), Some("v1".to_string()));
    }

    #[test]
    fn incr_by_creates_counter_at_zero() {
        let mut store = Store::new(None);
        assert_eq!(incr_by(&mut store, "c", 5).unwrap(), 5);
        assert_eq!(incr_by(&mut store, "c", -2).unwrap(), 3);
    }
}

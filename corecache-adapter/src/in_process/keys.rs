//! Key-management command family. `TTL`/`PTTL` return `-2` for
//! an absent key and `-1` for a key with no expiry, matching the documented
//! reply convention.

use std::time::{Duration, Instant};

use corecache_core::{CommandError, DataType};

use super::store::{Entry, Store};
use crate::adapter::ScanPage;
use crate::options::ScanOptions;

pub fn del(store: &mut Store, keys: &[String]) -> Result<i64, CommandError> {
    let mut count = 0;
    for k in keys {
        if store.remove(k).is_some() {
            count += 1;
        }
    }
    Ok(count)
}

pub fn exists(store: &mut Store, keys: &[String]) -> Result<i64, CommandError> {
    Ok(keys.iter().filter(|k| store.contains(k)).count() as i64)
}

pub fn expire(store: &mut Store, key: &str, seconds: u64) -> Result<bool, CommandError> {
    match store.get_mut(key) {
        Some(entry) => {
            entry.expires_at = Some(Instant::now() + Duration::from_secs(seconds));
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Convert an absolute Unix timestamp into the [`Entry::expires_at`]
/// monotonic instant this in-process store tracks internally.
pub fn expire_at(store: &mut Store, key: &str, unix_seconds: i64) -> Result<bool, CommandError> {
    let now_unix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_err(|e| CommandError::Command(e.to_string()))?
        .as_secs() as i64;
    let delta = unix_seconds - now_unix;
    if delta <= 0 {
        return match store.remove(key) {
            Some(_) => Ok(true),
            None => Ok(false),
        };
    }
    expire(store, key, delta as u64)
}

pub fn ttl(store: &mut Store, key: &str) -> Result<i64, CommandError> {
    match store.get(key) {
        None => Ok(-2),
        Some(entry) => match entry.expires_at {
            None => Ok(-1),
            Some(at) => Ok(at.saturating_duration_since(Instant::now()).as_secs() as i64),
        },
    }
}

pub fn pttl(store: &mut Store, key: &str) -> Result<i64, CommandError> {
    match store.get(key) {
        None => Ok(-2),
        Some(entry) => match entry.expires_at {
            None => Ok(-1),
            Some(at) => Ok(at.saturating_duration_since(Instant::now()).as_millis() as i64),
        },
    }
}

pub fn persist(store: &mut Store, key: &str) -> Result<bool, CommandError> {
    match store.get_mut(key) {
        Some(entry) if entry.expires_at.is_some() => {
            entry.expires_at = None;
            Ok(true)
        }
        _ => Ok(false),
    }
}

pub fn rename(store: &mut Store, src: &str, dst: &str) -> Result<(), CommandError> {
    match store.remove(src) {
        Some(Entry { value, expires_at }) => {
            store.insert(dst.to_string(), Entry { value, expires_at });
            Ok(())
        }
        None => Err(CommandError::NotFound(src.to_string())),
    }
}

pub fn key_type(store: &mut Store, key: &str) -> Result<DataType, CommandError> {
    match store.get(key) {
        Some(entry) => Ok(entry.value.data_type()),
        None => Err(CommandError::NotFound(key.to_string())),
    }
}

pub fn keys(store: &mut Store, pattern: &str) -> Result<Vec<String>, CommandError> {
    store.sweep_expired();
    let re = glob_to_regex(pattern)?;
    Ok(store.entries.keys().filter(|k| re.is_match(k)).cloned().collect())
}

/// `SCAN` walks the key space in index order using the cursor as an offset
/// into a stable snapshot; cursor `0` both starts and (when returned) ends a
/// scan.
pub fn scan(store: &mut Store, cursor: u64, opts: ScanOptions) -> Result<ScanPage, CommandError> {
    store.sweep_expired();
    let re = opts
        .match_pattern
        .as_deref()
        .map(glob_to_regex)
        .transpose()?;
    let page_size = opts.count.unwrap_or(10).max(1) as usize;

    let mut all: Vec<&String> = store.entries.keys().collect();
    all.sort();
    let filtered: Vec<String> = all
        .into_iter()
        .filter(|k| re.as_ref().map(|r| r.is_match(k)).unwrap_or(true))
        .filter(|k| {
            opts.type_filter
                .map(|t| store.entries.get(*k).map(|e| e.value.data_type()) == Some(t))
                .unwrap_or(true)
        })
        .cloned()
        .collect();

    let start = cursor as usize;
    if start >= filtered.len() {
        return Ok(ScanPage { next_cursor: 0, keys: Vec::new() });
    }
    let end = (start + page_size).min(filtered.len());
    let next_cursor = if end >= filtered.len() { 0 } else { end as u64 };
    Ok(ScanPage { next_cursor, keys: filtered[start..end].to_vec() })
}

fn glob_to_regex(pattern: &str) -> Result<regex::Regex, CommandError> {
    let mut escaped = String::with_capacity(pattern.len() + 2);
    escaped.push('^');
    for c in pattern.chars() {
        match c {
            '*' => escaped.push_str(".*"),
            '?' => escaped.push('.'),
            c if "\\.+()|[]{}^$".contains(c) => {
                escaped.push('\\');
                escaped.push(c);
            }
            c => escaped.push(c),
        }
    }
    escaped.push('$');
    regex::Regex::new(&escaped).map_err(|e| CommandError::Command(format!("invalid pattern: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_process::store::StoreValue;

    #[test]
    fn ttl_reports_minus_two_for_absent_key() {
        let mut store = Store::new(None);
        assert_eq!(ttl(&mut store, "missing").unwrap(), -2);
    }

    #[test]
    fn ttl_reports_minus_one_without_expiry() {
        let mut store = Store::new(None);
        store.insert("k".into(), Entry::new(StoreValue::String("v".into())));
        assert_eq!(ttl(&mut store, "k").unwrap(), -1);
    }

    #[test]
    fn scan_pages_through_keys_and_returns_zero_when_done() {
        let mut store = Store::new(None);
        for i in 0..5 {
            store.insert(format!("k{i}"), Entry::new(StoreValue::String("v".into())));
        }
        let opts = ScanOptions { count: Some(2), ..Default::default() };
        let page1 = scan(&mut store, 0, opts.clone()).unwrap();
        assert_eq!(page1.keys.len(), 2);
        assert_ne!(page1.next_cursor, 0);
        let mut cursor = page1.next_cursor;
        let mut seen = page1.keys.len();
        loop {
            let page = scan(&mut store, cursor, opts.clone()).unwrap();
            seen += page.keys.len();
            if page.next_cursor == 0 {
                break;
            }
            cursor = page.next_cursor;
        }
        assert_eq!(seen, 5);
    }

    #[test]
    fn keys_matches_glob_pattern() {
        let mut store = Store::new(None);
        store.insert("user:1".into(), Entry::new(StoreValue::String("v".into())));
        store.insert("order:1".into(), Entry::new(StoreValue::String("v".into())));
        assert_eq!(keys(&mut store, "user:*").unwrap(), vec!["user:1".to_string()]);
    }
}

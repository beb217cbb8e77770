//! List command family. Indices follow the documented
//! negative-index convention: `-1` is the last element.

use std::collections::VecDeque;

use corecache_core::CommandError;

use super::store::{Entry, Store, StoreValue};

fn as_list<'a>(store: &'a mut Store, key: &str) -> Result<Option<&'a VecDeque<String>>, CommandError> {
    match store.get(key) {
        None => Ok(None),
        Some(entry) => match &entry.value {
            StoreValue::List(l) => Ok(Some(l)),
            other => Err(CommandError::Command(format!(
                "WRONGTYPE key holds a {:?}, not a list",
                other.data_type()
            ))),
        },
    }
}

fn as_list_mut<'a>(store: &'a mut Store, key: &str) -> Result<&'a mut VecDeque<String>, CommandError> {
    store.expire_if_due(key);
    if !store.entries.contains_key(key) {
        store.insert(key.to_string(), Entry::new(StoreValue::List(VecDeque::new())));
    }
    match &mut store.entries.get_mut(key).unwrap().value {
        StoreValue::List(l) => Ok(l),
        other => Err(CommandError::Command(format!(
            "WRONGTYPE key holds a {:?}, not a list",
            other.data_type()
        ))),
    }
}

/// Normalize a possibly-negative index against `len`; returns `None` when
/// out of range.
fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let idx = if index < 0 { len + index } else { index };
    if idx < 0 || idx >= len {
        None
    } else {
        Some(idx as usize)
    }
}

pub fn lpush(store: &mut Store, key: &str, values: &[String]) -> Result<i64, CommandError> {
    let list = as_list_mut(store, key)?;
    for v in values {
        list.push_front(v.clone());
    }
    Ok(list.len() as i64)
}

pub fn rpush(store: &mut Store, key: &str, values: &[String]) -> Result<i64, CommandError> {
    let list = as_list_mut(store, key)?;
    for v in values {
        list.push_back(v.clone());
    }
    Ok(list.len() as i64)
}

pub fn lpop(store: &mut Store, key: &str) -> Result<Option<String>, CommandError> {
    if !store.contains(key) {
        return Ok(None);
    }
    Ok(as_list_mut(store, key)?.pop_front())
}

pub fn rpop(store: &mut Store, key: &str) -> Result<Option<String>, CommandError> {
    if !store.contains(key) {
        return Ok(None);
    }
    Ok(as_list_mut(store, key)?.pop_back())
}

pub fn lrange(store: &mut Store, key: &str, start: i64, stop: i64) -> Result<Vec<String>, CommandError> {
    let list = match as_list(store, key)? {
        Some(l) => l,
        None => return Ok(Vec::new()),
    };
    let len = list.len();
    if len == 0 {
        return Ok(Vec::new());
    }
    let start_idx = normalize_index(start, len).unwrap_or(0);
    let stop_idx = normalize_index(stop, len).unwrap_or(len.saturating_sub(1));
    if start_idx > stop_idx {
        return Ok(Vec::new());
    }
    Ok(list.iter().skip(start_idx).take(stop_idx - start_idx + 1).cloned().collect())
}

pub fn ltrim(store: &mut Store, key: &str, start: i64, stop: i64) -> Result<(), CommandError> {
    let kept = lrange(store, key, start, stop)?;
    if store.contains(key) {
        let list = as_list_mut(store, key)?;
        *list = kept.into();
    }
    Ok(())
}

pub fn lindex(store: &mut Store, key: &str, index: i64) -> Result<Option<String>, CommandError> {
    let list = match as_list(store, key)? {
        Some(l) => l,
        None => return Ok(None),
    };
    Ok(normalize_index(index, list.len()).and_then(|i| list.get(i).cloned()))
}

pub fn lset(store: &mut Store, key: &str, index: i64, value: &str) -> Result<(), CommandError> {
    let list = as_list_mut(store, key)?;
    let len = list.len();
    match normalize_index(index, len) {
        Some(i) => {
            list[i] = value.to_string();
            Ok(())
        }
        None => Err(CommandError::Command("index out of range".into())),
    }
}

pub fn lrem(store: &mut Store, key: &str, count: i64, value: &str) -> Result<i64, CommandError> {
    if !store.contains(key) {
        return Ok(0);
    }
    let list = as_list_mut(store, key)?;
    let mut removed = 0i64;
    if count >= 0 {
        let limit = if count == 0 { usize::MAX } else { count as usize };
        let mut kept = VecDeque::with_capacity(list.len());
        for item in list.drain(..) {
            if removed < limit as i64 && item == value {
                removed += 1;
            } else {
                kept.push_back(item);
            }
        }
        *list = kept;
    } else {
        let limit = (-count) as usize;
        let mut kept: VecDeque<String> = VecDeque::with_capacity(list.len());
        for item in list.drain(..).collect::<Vec<_>>().into_iter().rev() {
            if (removed as usize) < limit && item == value {
                removed += 1;
            } else {
                kept.push_front(item);
            }
        }
        *list = kept;
    }
    Ok(removed)
}

pub fn lpos(store: &mut Store, key: &str, value: &str) -> Result<Option<i64>, CommandError> {
    let list = match as_list(store, key)? {
        Some(l) => l,
        None => return Ok(None),
    };
    Ok(list.iter().position(|v| v == value).map(|i| i as i64))
}

pub fn linsert(
    store: &mut Store,
    key: &str,
    before: bool,
    pivot: &str,
    value: &str,
) -> Result<i64, CommandError> {
    if !store.contains(key) {
        return Ok(0);
    }
    let list = as_list_mut(store, key)?;
    match list.iter().position(|v| v == pivot) {
        None => Ok(-1),
        Some(pos) => {
            let insert_at = if before { pos } else { pos + 1 };
            list.insert(insert_at, value.to_string());
            Ok(list.len() as i64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lrange_handles_negative_indices() {
        let mut store = Store::new(None);
        rpush(&mut store, "l", &["a".into(), "b".into(), "c".into()]).unwrap();
        assert_eq!(lrange(&mut store, "l", -2, -1).unwrap(), vec!["b", "c"]);
    }

    #[test]
    fn lrem_negative_count_removes_from_tail() {
        let mut store = Store::new(None);
        rpush(&mut store, "l", &["a".into(), "x".into(), "x".into(), "b".into()]).unwrap();
        let removed = lrem(&mut store, "l", -1, "x").unwrap();
        assert_eq!(removed, 1);
        assert_eq!(lrange(&mut store, "l", 0, -1).unwrap(), vec!["a", "x", "b"]);
    }
}

//! Stream command family. Entry ids are `<millis>-<seq>`,
//! auto-assigned on `*` the way the wire protocol documents.

use corecache_core::CommandError;

use super::store::{Entry, Store, StoreValue, StreamEntry};
use crate::options::TrimStrategy;
use crate::pipeline::StreamRecord;

fn as_stream<'a>(store: &'a mut Store, key: &str) -> Result<Option<&'a Vec<StreamEntry>>, CommandError> {
    match store.get(key) {
        None => Ok(None),
        Some(entry) => match &entry.value {
            StoreValue::Stream(s) => Ok(Some(s)),
            other => Err(CommandError::Command(format!(
                "WRONGTYPE key holds a {:?}, not a stream",
                other.data_type()
            ))),
        },
    }
}

fn as_stream_mut<'a>(store: &'a mut Store, key: &str) -> Result<&'a mut Vec<StreamEntry>, CommandError> {
    store.expire_if_due(key);
    if !store.entries.contains_key(key) {
        store.insert(key.to_string(), Entry::new(StoreValue::Stream(Vec::new())));
    }
    match &mut store.entries.get_mut(key).unwrap().value {
        StoreValue::Stream(s) => Ok(s),
        other => Err(CommandError::Command(format!(
            "WRONGTYPE key holds a {:?}, not a stream",
            other.data_type()
        ))),
    }
}

/// Parse a `millis-seq` stream id; `id` may omit the sequence (`millis`
/// alone means `millis-0` as a range endpoint).
fn parse_id(id: &str) -> Result<(u64, u64), CommandError> {
    let mut parts = id.splitn(2, '-');
    let millis: u64 = parts
        .next()
        .unwrap_or("0")
        .parse()
        .map_err(|_| CommandError::Command(format!("invalid stream id: {id}")))?;
    let seq: u64 = match parts.next() {
        Some(s) => s.parse().map_err(|_| CommandError::Command(format!("invalid stream id: {id}")))?,
        None => 0,
    };
    Ok((millis, seq))
}

fn next_auto_id(existing: &[StreamEntry]) -> String {
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    let seq = existing
        .last()
        .and_then(|e| parse_id(&e.id).ok())
        .filter(|(m, _)| *m == millis)
        .map(|(_, s)| s + 1)
        .unwrap_or(0);
    format!("{millis}-{seq}")
}

pub fn xadd(store: &mut Store, key: &str, id: &str, fields: &[(String, String)]) -> Result<String, CommandError> {
    let stream = as_stream_mut(store, key)?;
    let entry_id = if id == "*" {
        next_auto_id(stream)
    } else {
        parse_id(id)?;
        id.to_string()
    };
    if let Some(last) = stream.last() {
        if parse_id(&last.id)? >= parse_id(&entry_id)? {
            return Err(CommandError::Command(
                "stream id must be greater than the last entry".into(),
            ));
        }
    }
    stream.push(StreamEntry { id: entry_id.clone(), fields: fields.to_vec() });
    Ok(entry_id)
}

fn in_range(id: &str, start: (u64, u64), end: (u64, u64)) -> Result<bool, CommandError> {
    let parsed = parse_id(id)?;
    Ok(parsed >= start && parsed <= end)
}

pub fn xrange(
    store: &mut Store,
    key: &str,
    start: &str,
    end: &str,
    count: Option<u64>,
) -> Result<Vec<StreamRecord>, CommandError> {
    let start_b = if start == "-" { (0, 0) } else { parse_id(start)? };
    let end_b = if end == "+" { (u64::MAX, u64::MAX) } else { parse_id(end)? };
    let stream = match as_stream(store, key)? {
        Some(s) => s,
        None => return Ok(Vec::new()),
    };
    let mut out: Vec<StreamRecord> = Vec::new();
    for entry in stream {
        if in_range(&entry.id, start_b, end_b)? {
            out.push(StreamRecord { id: entry.id.clone(), fields: entry.fields.clone() });
            if count.map(|c| out.len() as u64 >= c).unwrap_or(false) {
                break;
            }
        }
    }
    Ok(out)
}

pub fn xrevrange(
    store: &mut Store,
    key: &str,
    end: &str,
    start: &str,
    count: Option<u64>,
) -> Result<Vec<StreamRecord>, CommandError> {
    let mut forward = xrange(store, key, start, end, None)?;
    forward.reverse();
    if let Some(c) = count {
        forward.truncate(c as usize);
    }
    Ok(forward)
}

pub fn xlen(store: &mut Store, key: &str) -> Result<i64, CommandError> {
    Ok(as_stream(store, key)?.map(|s| s.len() as i64).unwrap_or(0))
}

pub fn xtrim(
    store: &mut Store,
    key: &str,
    strategy: TrimStrategy,
    threshold: &str,
    _approximate: bool,
) -> Result<i64, CommandError> {
    let stream = as_stream_mut(store, key)?;
    let before = stream.len();
    match strategy {
        TrimStrategy::MaxLen => {
            let max_len: usize = threshold
                .parse()
                .map_err(|_| CommandError::Command(format!("invalid MAXLEN threshold: {threshold}")))?;
            if stream.len() > max_len {
                let drop = stream.len() - max_len;
                stream.drain(0..drop);
            }
        }
        TrimStrategy::MinId => {
            let min = parse_id(threshold)?;
            stream.retain(|e| parse_id(&e.id).map(|id| id >= min).unwrap_or(true));
        }
    }
    Ok((before - stream.len()) as i64)
}

pub fn xdel(store: &mut Store, key: &str, ids: &[String]) -> Result<i64, CommandError> {
    if !store.contains(key) {
        return Ok(0);
    }
    let stream = as_stream_mut(store, key)?;
    let before = stream.len();
    stream.retain(|e| !ids.contains(&e.id));
    Ok((before - stream.len()) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xadd_autoincrements_sequence_within_same_millisecond() {
        let mut store = Store::new(None);
        let id1 = xadd(&mut store, "s", "5-0", &[("f".into(), "v".into())]).unwrap();
        let id2 = xadd(&mut store, "s", "5-1", &[("f".into(), "v2".into())]).unwrap();
        assert_eq!(id1, "5-0");
        assert_eq!(id2, "5-1");
    }

    #[test]
    fn xadd_rejects_non_increasing_id() {
        let mut store = Store::new(None);
        xadd(&mut store, "s", "5-0", &[]).unwrap();
        assert!(xadd(&mut store, "s", "4-0", &[]).is_err());
    }

    #[test]
    fn xrange_filters_by_id_bounds() {
        let mut store = Store::new(None);
        xadd(&mut store, "s", "1-0", &[]).unwrap();
        xadd(&mut store, "s", "2-0", &[]).unwrap();
        xadd(&mut store, "s", "3-0", &[]).unwrap();
        let result = xrange(&mut store, "s", "2-0", "+", None).unwrap();
        assert_eq!(result.len(), 2);
    }
}

//! Sorted-set command family. Backed by
//! [`super::store::SortedSetValue`]'s dual `BTreeSet`/`HashMap` index.

use corecache_core::{CommandError, ScoreBound};

use super::store::{Entry, OrderedScore, SortedSetValue, Store, StoreValue};
use crate::options::ZAddOptions;

fn as_zset<'a>(store: &'a mut Store, key: &str) -> Result<Option<&'a SortedSetValue>, CommandError> {
    match store.get(key) {
        None => Ok(None),
        Some(entry) => match &entry.value {
            StoreValue::SortedSet(z) => Ok(Some(z)),
            other => Err(CommandError::Command(format!(
                "WRONGTYPE key holds a {:?}, not a sorted set",
                other.data_type()
            ))),
        },
    }
}

fn as_zset_mut<'a>(store: &'a mut Store, key: &str) -> Result<&'a mut SortedSetValue, CommandError> {
    store.expire_if_due(key);
    if !store.entries.contains_key(key) {
        store.insert(key.to_string(), Entry::new(StoreValue::SortedSet(SortedSetValue::default())));
    }
    match &mut store.entries.get_mut(key).unwrap().value {
        StoreValue::SortedSet(z) => Ok(z),
        other => Err(CommandError::Command(format!(
            "WRONGTYPE key holds a {:?}, not a sorted set",
            other.data_type()
        ))),
    }
}

pub fn zadd(
    store: &mut Store,
    key: &str,
    members: &[(f64, String)],
    opts: ZAddOptions,
) -> Result<i64, CommandError> {
    let zset = as_zset_mut(store, key)?;
    let mut added = 0;
    for (score, member) in members {
        let existing = zset.by_member.get(member).copied();
        if opts.nx && existing.is_some() {
            continue;
        }
        if opts.xx && existing.is_none() {
            continue;
        }
        if let Some(old) = existing {
            if opts.gt && *score <= old {
                continue;
            }
            if opts.lt && *score >= old {
                continue;
            }
        }
        if zset.insert(member.clone(), *score) {
            added += 1;
        }
    }
    Ok(added)
}

pub fn zrem(store: &mut Store, key: &str, members: &[String]) -> Result<i64, CommandError> {
    if !store.contains(key) {
        return Ok(0);
    }
    let zset = as_zset_mut(store, key)?;
    let mut removed = 0;
    for m in members {
        if zset.remove(m) {
            removed += 1;
        }
    }
    Ok(removed)
}

pub fn zscore(store: &mut Store, key: &str, member: &str) -> Result<Option<f64>, CommandError> {
    Ok(as_zset(store, key)?.and_then(|z| z.by_member.get(member).copied()))
}

pub fn zrank(store: &mut Store, key: &str, member: &str) -> Result<Option<i64>, CommandError> {
    let zset = match as_zset(store, key)? {
        Some(z) => z,
        None => return Ok(None),
    };
    let score = match zset.by_member.get(member) {
        Some(s) => *s,
        None => return Ok(None),
    };
    Ok(zset
        .by_rank
        .iter()
        .position(|(sc, m)| *sc == OrderedScore(score) && m == member)
        .map(|i| i as i64))
}

pub fn zrevrank(store: &mut Store, key: &str, member: &str) -> Result<Option<i64>, CommandError> {
    let len = as_zset(store, key)?.map(|z| z.len()).unwrap_or(0);
    Ok(zrank(store, key, member)?.map(|r| len as i64 - 1 - r))
}

pub fn zcard(store: &mut Store, key: &str) -> Result<i64, CommandError> {
    Ok(as_zset(store, key)?.map(|z| z.len() as i64).unwrap_or(0))
}

pub fn zcount(store: &mut Store, key: &str, min: &str, max: &str) -> Result<i64, CommandError> {
    let lower = ScoreBound::parse(min)?;
    let upper = ScoreBound::parse(max)?;
    let zset = match as_zset(store, key)? {
        Some(z) => z,
        None => return Ok(0),
    };
    Ok(zset
        .by_member
        .values()
        .filter(|&&score| lower.satisfies_lower(score) && upper.satisfies_upper(score))
        .count() as i64)
}

pub fn zincrby(store: &mut Store, key: &str, delta: f64, member: &str) -> Result<f64, CommandError> {
    let zset = as_zset_mut(store, key)?;
    let next = zset.by_member.get(member).copied().unwrap_or(0.0) + delta;
    zset.insert(member.to_string(), next);
    Ok(next)
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let idx = if index < 0 { len + index } else { index };
    if idx < 0 || idx >= len {
        None
    } else {
        Some(idx as usize)
    }
}

pub fn zrange(store: &mut Store, key: &str, start: i64, stop: i64) -> Result<Vec<(String, f64)>, CommandError> {
    let zset = match as_zset(store, key)? {
        Some(z) => z,
        None => return Ok(Vec::new()),
    };
    let len = zset.len();
    if len == 0 {
        return Ok(Vec::new());
    }
    let start_idx = normalize_index(start, len).unwrap_or(0);
    let stop_idx = normalize_index(stop, len).unwrap_or(len.saturating_sub(1));
    if start_idx > stop_idx {
        return Ok(Vec::new());
    }
    Ok(zset
        .by_rank
        .iter()
        .skip(start_idx)
        .take(stop_idx - start_idx + 1)
        .map(|(OrderedScore(score), member)| (member.clone(), *score))
        .collect())
}

pub fn zrevrange(store: &mut Store, key: &str, start: i64, stop: i64) -> Result<Vec<(String, f64)>, CommandError> {
    // start/stop index from the descending end, so derive the reversed
    // sequence directly rather than reversing an ascending slice.
    let zset = match as_zset(store, key)? {
        Some(z) => z,
        None => return Ok(Vec::new()),
    };
    let rev: Vec<(String, f64)> = zset
        .by_rank
        .iter()
        .rev()
        .map(|(OrderedScore(score), member)| (member.clone(), *score))
        .collect();
    let rev_len = rev.len();
    if rev_len == 0 {
        return Ok(rev);
    }
    let start_idx = normalize_index(start, rev_len).unwrap_or(0);
    let stop_idx = normalize_index(stop, rev_len).unwrap_or(rev_len.saturating_sub(1));
    if start_idx > stop_idx {
        return Ok(Vec::new());
    }
    Ok(rev[start_idx..=stop_idx].to_vec())
}

pub fn zrangebyscore(
    store: &mut Store,
    key: &str,
    min: &str,
    max: &str,
    limit: Option<(i64, i64)>,
) -> Result<Vec<(String, f64)>, CommandError> {
    let lower = ScoreBound::parse(min)?;
    let upper = ScoreBound::parse(max)?;
    let zset = match as_zset(store, key)? {
        Some(z) => z,
        None => return Ok(Vec::new()),
    };
    let mut matches: Vec<(String, f64)> = zset
        .by_rank
        .iter()
        .filter(|(OrderedScore(score), _)| lower.satisfies_lower(*score) && upper.satisfies_upper(*score))
        .map(|(OrderedScore(score), member)| (member.clone(), *score))
        .collect();
    apply_limit(&mut matches, limit);
    Ok(matches)
}

pub fn zrevrangebyscore(
    store: &mut Store,
    key: &str,
    max: &str,
    min: &str,
    limit: Option<(i64, i64)>,
) -> Result<Vec<(String, f64)>, CommandError> {
    let mut matches = zrangebyscore(store, key, min, max, None)?;
    matches.reverse();
    apply_limit(&mut matches, limit);
    Ok(matches)
}

fn apply_limit(matches: &mut Vec<(String, f64)>, limit: Option<(i64, i64)>) {
    if let Some((offset, count)) = limit {
        let offset = offset.max(0) as usize;
        if offset >= matches.len() {
            matches.clear();
            return;
        }
        let remaining = matches.split_off(offset);
        *matches = if count < 0 {
            remaining
        } else {
            remaining.into_iter().take(count as usize).collect()
        };
    }
}

pub fn zremrangebyrank(store: &mut Store, key: &str, start: i64, stop: i64) -> Result<i64, CommandError> {
    let victims: Vec<String> = zrange(store, key, start, stop)?.into_iter().map(|(m, _)| m).collect();
    if victims.is_empty() || !store.contains(key) {
        return Ok(0);
    }
    zrem(store, key, &victims)
}

pub fn zremrangebyscore(store: &mut Store, key: &str, min: &str, max: &str) -> Result<i64, CommandError> {
    let victims: Vec<String> = zrangebyscore(store, key, min, max, None)?
        .into_iter()
        .map(|(m, _)| m)
        .collect();
    if victims.is_empty() || !store.contains(key) {
        return Ok(0);
    }
    zrem(store, key, &victims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zrange_orders_by_score_then_returns_member_score_pairs() {
        let mut store = Store::new(None);
        zadd(&mut store, "z", &[(3.0, "c".into()), (1.0, "a".into()), (2.0, "b".into())], ZAddOptions::default()).unwrap();
        let result = zrange(&mut store, "z", 0, -1).unwrap();
        assert_eq!(result, vec![("a".to_string(), 1.0), ("b".to_string(), 2.0), ("c".to_string(), 3.0)]);
    }

    #[test]
    fn zadd_gt_skips_lower_update() {
        let mut store = Store::new(None);
        zadd(&mut store, "z", &[(5.0, "m".into())], ZAddOptions::default()).unwrap();
        zadd(&mut store, "z", &[(3.0, "m".into())], ZAddOptions { gt: true, ..Default::default() }).unwrap();
        assert_eq!(zscore(&mut store, "z", "m").unwrap(), Some(5.0));
    }

    #[test]
    fn zcount_respects_exclusive_bounds() {
        let mut store = Store::new(None);
        zadd(&mut store, "z", &[(1.0, "a".into()), (2.0, "b".into()), (3.0, "c".into())], ZAddOptions::default()).unwrap();
        assert_eq!(zcount(&mut store, "z", "(1", "3").unwrap(), 2);
    }
}

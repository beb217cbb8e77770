//! The closed enumeration of commands an Adapter may execute.
//!
//! `Command` is an explicit enum and every adapter implements a static
//! `match` over it rather than looking up a method by string. New commands
//! are added by extending this enum and registering a new
//! [`crate::OperationDescriptor`], not by adding ad-hoc string keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Command {
    // Strings
    Set,
    Get,
    MSet,
    MGet,
    Incr,
    IncrBy,
    Decr,
    DecrBy,

    // Hashes
    HSet,
    HMSet,
    HGet,
    HGetAll,
    HMGet,
    HDel,
    HExists,
    HIncrBy,
    HLen,

    // Lists
    LPush,
    RPush,
    LPop,
    RPop,
    LRange,
    LTrim,
    LIndex,
    LSet,
    LRem,
    LPos,
    LInsert,

    // Sets
    SAdd,
    SRem,
    SMembers,
    SIsMember,
    SCard,
    SInter,
    SUnion,
    SDiff,

    // Sorted sets
    ZAdd,
    ZRem,
    ZScore,
    ZRank,
    ZRevRank,
    ZCard,
    ZCount,
    ZIncrBy,
    ZRange,
    ZRevRange,
    ZRangeByScore,
    ZRevRangeByScore,
    ZRemRangeByRank,
    ZRemRangeByScore,

    // Key management
    Del,
    Exists,
    Expire,
    ExpireAt,
    Ttl,
    Pttl,
    Persist,
    Rename,
    Type,
    Keys,
    Scan,

    // HyperLogLog
    PfAdd,
    PfCount,
    PfMerge,

    // Bloom filter
    BfReserve,
    BfAdd,
    BfMAdd,
    BfExists,
    BfMExists,

    // Streams
    XAdd,
    XRead,
    XRange,
    XRevRange,
    XLen,
    XTrim,
    XDel,
}

impl Command {
    /// The canonical uppercase name, as used by `executeScript`/logging and by
    /// the external (Redis-compatible) adapter when building wire commands.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Set => "SET",
            Command::Get => "GET",
            Command::MSet => "MSET",
            Command::MGet => "MGET",
            Command::Incr => "INCR",
            Command::IncrBy => "INCRBY",
            Command::Decr => "DECR",
            Command::DecrBy => "DECRBY",
            Command::HSet => "HSET",
            Command::HMSet => "HMSET",
            Command::HGet => "HGET",
            Command::HGetAll => "HGETALL",
            Command::HMGet => "HMGET",
            Command::HDel => "HDEL",
            Command::HExists => "HEXISTS",
            Command::HIncrBy => "HINCRBY",
            Command::HLen => "HLEN",
            Command::LPush => "LPUSH",
            Command::RPush => "RPUSH",
            Command::LPop => "LPOP",
            Command::RPop => "RPOP",
            Command::LRange => "LRANGE",
            Command::LTrim => "LTRIM",
            Command::LIndex => "LINDEX",
            Command::LSet => "LSET",
            Command::LRem => "LREM",
            Command::LPos => "LPOS",
            Command::LInsert => "LINSERT",
            Command::SAdd => "SADD",
            Command::SRem => "SREM",
            Command::SMembers => "SMEMBERS",
            Command::SIsMember => "SISMEMBER",
            Command::SCard => "SCARD",
            Command::SInter => "SINTER",
            Command::SUnion => "SUNION",
            Command::SDiff => "SDIFF",
            Command::ZAdd => "ZADD",
            Command::ZRem => "ZREM",
            Command::ZScore => "ZSCORE",
            Command::ZRank => "ZRANK",
            Command::ZRevRank => "ZREVRANK",
            Command::ZCard => "ZCARD",
            Command::ZCount => "ZCOUNT",
            Command::ZIncrBy => "ZINCRBY",
            Command::ZRange => "ZRANGE",
            Command::ZRevRange => "ZREVRANGE",
            Command::ZRangeByScore => "ZRANGEBYSCORE",
            Command::ZRevRangeByScore => "ZREVRANGEBYSCORE",
            Command::ZRemRangeByRank => "ZREMRANGEBYRANK",
            Command::ZRemRangeByScore => "ZREMRANGEBYSCORE",
            Command::Del => "DEL",
            Command::Exists => "EXISTS",
            Command::Expire => "EXPIRE",
            Command::ExpireAt => "EXPIREAT",
            Command::Ttl => "TTL",
            Command::Pttl => "PTTL",
            Command::Persist => "PERSIST",
            Command::Rename => "RENAME",
            Command::Type => "TYPE",
            Command::Keys => "KEYS",
            Command::Scan => "SCAN",
            Command::PfAdd => "PFADD",
            Command::PfCount => "PFCOUNT",
            Command::PfMerge => "PFMERGE",
            Command::BfReserve => "BF.RESERVE",
            Command::BfAdd => "BF.ADD",
            Command::BfMAdd => "BF.MADD",
            Command::BfExists => "BF.EXISTS",
            Command::BfMExists => "BF.MEXISTS",
            Command::XAdd => "XADD",
            Command::XRead => "XREAD",
            Command::XRange => "XRANGE",
            Command::XRevRange => "XREVRANGE",
            Command::XLen => "XLEN",
            Command::XTrim => "XTRIM",
            Command::XDel => "XDEL",
        }
    }

    /// Whether this command takes exactly one key argument versus N (the
    /// set-algebra family and multi-key key-management commands).
    pub fn is_multi_key(&self) -> bool {
        matches!(
            self,
            Command::MSet
                | Command::MGet
                | Command::SInter
                | Command::SUnion
                | Command::SDiff
                | Command::Del
                | Command::Exists
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bloom_commands_use_dotted_names() {
        assert_eq!(Command::BfReserve.name(), "BF.RESERVE");
    }

    #[test]
    fn multi_key_classification() {
        assert!(Command::Del.is_multi_key());
        assert!(!Command::Get.is_multi_key());
    }
}

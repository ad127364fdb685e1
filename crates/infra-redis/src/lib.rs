// Surge Infrastructure - Redis Adapter
// Implements: ListBackend (RPUSH / BLPOP / LLEN)

mod list_backend;

pub use list_backend::RedisListBackend;

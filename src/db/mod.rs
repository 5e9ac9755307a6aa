pub mod local;
pub mod redis;

pub use local::LocalStorage;
pub use redis::create_redis_client;
pub use redis::Cache;
pub use redis::CacheKey;
pub use redis::CacheWriterHandle;

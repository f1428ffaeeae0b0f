pub mod memory_store;
pub mod noop_session_registry;
pub mod redis_service;
pub mod store_session_registry;

pub use memory_store::MemoryStore;
pub use noop_session_registry::NoopSessionRegistry;
pub use redis_service::RedisService;
pub use store_session_registry::StoreSessionRegistry;

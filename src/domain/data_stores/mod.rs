pub mod audit_sink;
pub mod jwt_key_store;
pub mod key_value_store;
pub mod rate_limiter;
pub mod session_registry;
pub mod store_err;

pub use audit_sink::*;
pub use jwt_key_store::JwtKeyStore;
pub use key_value_store::*;
pub use rate_limiter::*;
pub use session_registry::SessionRegistry;
pub use store_err::StoreError;

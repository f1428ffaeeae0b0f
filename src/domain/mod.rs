pub mod account;
pub mod audit_event;
pub mod claims;
pub mod data_stores;
pub mod issued_tokens;
pub mod role;
pub mod session;

pub use account::*;
pub use audit_event::*;
pub use claims::*;
pub use data_stores::*;
pub use issued_tokens::*;
pub use role::*;
pub use session::*;

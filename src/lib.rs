//! Issuance, validation, rotation and revocation of signed session tokens
//! shared by every instance that talks to the same store.
pub mod domain;
pub mod errors;
pub mod services;
pub mod utils;

pub use domain::{Account, Claims, ClientContext, IssuedToken, IssuedTokens, Role, TokenKind};
pub use errors::SessionError;
pub use services::{CleanupSweeper, SessionAuthority, SweeperHandle};
pub use utils::{Config, ConfigError};

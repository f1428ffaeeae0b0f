use jsonwebtoken::{DecodingKey, EncodingKey};
use std::collections::HashMap;

/// HS256 key ring addressed by `kid`.
///
/// The active key signs; every configured key verifies, so a secret can be
/// rotated without invalidating tokens signed under the previous one.
#[derive(Clone)]
pub struct JwtKeyStore {
    active_kid: String,
    active_key: EncodingKey,
    // kid -> secret
    keys: HashMap<String, Vec<u8>>,
}

impl JwtKeyStore {
    /// Returns `None` if `active_kid` is not among `jwt_keys`.
    pub fn from_config(jwt_keys: &[(String, Vec<u8>)], active_kid: &str) -> Option<Self> {
        let keys: HashMap<String, Vec<u8>> = jwt_keys.iter().cloned().collect();
        let active_key = EncodingKey::from_secret(keys.get(active_kid)?);
        Some(Self {
            active_kid: active_kid.to_string(),
            active_key,
            keys,
        })
    }

    pub fn encoding_key_and_kid(&self) -> (&EncodingKey, &str) {
        (&self.active_key, &self.active_kid)
    }

    pub fn decoding_key_for_kid(&self, kid: Option<&str>) -> Option<DecodingKey> {
        let k = kid.unwrap_or(&self.active_kid);
        self.keys.get(k).map(|s| DecodingKey::from_secret(s))
    }
}

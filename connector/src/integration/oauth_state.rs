use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde::{Deserialize, Serialize};

use crate::error::{ConnectorError, ConnectorResult};

/// Bytes of entropy in a state nonce.
pub const NONCE_LEN: usize = 32;

/// URL-safe alphabet, padded on encode, lenient about padding on decode.
const STATE_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Anti-CSRF record round-tripped through the provider's `state` parameter.
///
/// The same JSON is staged server-side under `state:{org_id}:{user_id}`; a
/// callback is honoured only when both copies carry the same nonce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthState {
    #[serde(rename = "state")]
    pub nonce: String,
    pub user_id: String,
    pub org_id: String,
}

impl OAuthState {
    pub fn generate(user_id: &str, org_id: &str) -> Self {
        let bytes: [u8; NONCE_LEN] = rand::random();

        Self {
            nonce: URL_SAFE_NO_PAD.encode(bytes),
            user_id: user_id.to_owned(),
            org_id: org_id.to_owned(),
        }
    }

    pub fn to_json(&self) -> ConnectorResult<String> {
        serde_json::to_string(self).map_err(Into::into)
    }

    /// Base64url of the JSON form, ready for a query parameter.
    pub fn encode(&self) -> ConnectorResult<String> {
        Ok(STATE_ENGINE.encode(self.to_json()?))
    }

    pub fn decode(encoded: &str) -> ConnectorResult<Self> {
        let json = STATE_ENGINE
            .decode(encoded)
            .map_err(|_| ConnectorError::bad_request("malformed state"))?;

        serde_json::from_slice(&json).map_err(|_| ConnectorError::bad_request("malformed state"))
    }

    /// Whether `stored` (the staged JSON) was issued for this callback.
    pub fn matches_stored(&self, stored: &str) -> bool {
        serde_json::from_str::<Self>(stored).is_ok_and(|stored| stored == *self)
    }
}

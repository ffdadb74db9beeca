use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::error::Result;

use super::clock::{now_millis, SECONDS_IN_HOUR};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: u64,
}

/// Verifies bearer tokens issued by the session layer for this server.
#[derive(Clone)]
pub struct TokenVerifier {
    decoding: DecodingKey,
    encoding: EncodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        let validation = Validation::new(Algorithm::HS256);
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims> {
        let token_data = match decode::<Claims>(token, &self.decoding, &self.validation) {
            Ok(token) => token,
            Err(e) => match e.kind() {
                ErrorKind::InvalidToken => return Err(Error::AuthFailTokenWrongFormat),
                ErrorKind::InvalidSignature => return Err(Error::AuthFailInvalidToken),
                ErrorKind::MissingRequiredClaim(_) => return Err(Error::AuthFailInvalidToken),
                ErrorKind::ExpiredSignature => return Err(Error::AuthFailExpiredToken),
                _ => return Err(Error::AuthFailInvalidToken),
            },
        };
        Ok(token_data.claims)
    }

    /// Token valid for one hour, used by local tooling and tests
    pub fn sign(&self, user_id: &str) -> Result<String> {
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (now_millis() / 1000) as u64 + SECONDS_IN_HOUR,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|_| Error::AuthFailInvalidToken)
    }
}

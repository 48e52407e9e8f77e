use crate::errors::{AppError, ErrorType};
use bson::oid::ObjectId;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use warp::Filter;

pub const DEFAULT_JWT_SECRET: &str = "devicehub-secret";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize, // Expiration timestamp in seconds
}

/// The authenticated principal attached to a request. Token issuance lives
/// with the auth service; this side only verifies and extracts the owner id.
#[derive(Debug, Clone)]
pub struct AuthedUser {
    pub id: ObjectId,
}

fn jwt_secret() -> String {
    std::env::var("JWT_SECRET").unwrap_or_else(|_| DEFAULT_JWT_SECRET.to_string())
}

pub fn decode_token(authorization: &str, secret: &str) -> Result<AuthedUser, AppError> {
    if !authorization.starts_with("Bearer ") {
        return Err(AppError::new(
            "Authorization header must be a Bearer token",
            ErrorType::Auth,
        ));
    }
    let token = authorization.trim_start_matches("Bearer ");

    let decoding_key = DecodingKey::from_secret(secret.as_ref());
    let decoded = decode::<Claims>(token, &decoding_key, &Validation::default())
        .map_err(|_| AppError::new("Authorization token invalid or expired", ErrorType::Auth))?;

    let id = ObjectId::parse_str(&decoded.claims.sub)
        .map_err(|_| AppError::new("Authorization token invalid or expired", ErrorType::Auth))?;

    Ok(AuthedUser { id })
}

pub fn with_auth() -> impl Filter<Extract = (AuthedUser,), Error = warp::Rejection> + Clone {
    warp::header::<String>("authorization").and_then(|header_auth: String| async move {
        decode_token(&header_auth, &jwt_secret()).map_err(|e| e.reject())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn token_for(sub: &str, secret: &str) -> String {
        let exp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
            + 3600;
        let claims = Claims {
            sub: sub.to_string(),
            exp: exp as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_ref()),
        )
        .unwrap()
    }

    #[test]
    fn decodes_bearer_token_to_owner_id() {
        let owner = ObjectId::new();
        let token = token_for(&owner.to_hex(), DEFAULT_JWT_SECRET);

        let user = decode_token(&format!("Bearer {}", token), DEFAULT_JWT_SECRET).unwrap();
        assert_eq!(user.id, owner);
    }

    #[test]
    fn rejects_non_bearer_header() {
        let err = decode_token("Basic abc123", DEFAULT_JWT_SECRET).unwrap_err();
        assert_eq!(err.err_type, ErrorType::Auth);
    }

    #[test]
    fn rejects_wrong_secret() {
        let owner = ObjectId::new();
        let token = token_for(&owner.to_hex(), "some-other-secret");

        let err = decode_token(&format!("Bearer {}", token), DEFAULT_JWT_SECRET).unwrap_err();
        assert_eq!(err.err_type, ErrorType::Auth);
        assert_eq!(err.message, "Authorization token invalid or expired");
    }

    #[test]
    fn rejects_subject_that_is_not_an_object_id() {
        let token = token_for("not-an-object-id", DEFAULT_JWT_SECRET);
        let err = decode_token(&format!("Bearer {}", token), DEFAULT_JWT_SECRET).unwrap_err();
        assert_eq!(err.err_type, ErrorType::Auth);
    }
}

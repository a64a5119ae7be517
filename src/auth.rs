use actix_web::{dev::Payload, Error, FromRequest, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::env;
use std::future::{ready, Ready};

use crate::error::ApiError;
use crate::models::Id;

const TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Moderator,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Some(Role::User),
            "moderator" => Some(Role::Moderator),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Numeric user id, as a string.
    pub sub: String,
    pub exp: usize,
    pub roles: Vec<Role>,
}

fn secret() -> Result<String, jsonwebtoken::errors::Error> {
    env::var("JWT_SECRET").map_err(|_| jsonwebtoken::errors::ErrorKind::InvalidKeyFormat.into())
}

/// Validate a JWT and return its claims.
fn decode_jwt(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let secret = secret()?;
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)?;
    Ok(data.claims)
}

/// Extractor yielding validated `Claims`.
pub struct Auth(pub Claims);

impl Auth {
    /// The authenticated user's id. A token whose subject is not numeric was
    /// not minted by this service.
    pub fn user_id(&self) -> Result<Id, ApiError> {
        self.0.sub.parse().map_err(|_| ApiError::Unauthorized)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.0.roles.contains(&role)
    }

    /// Moderators and admins may manage other users' posts.
    pub fn is_staff(&self) -> bool {
        self.has_role(Role::Moderator) || self.has_role(Role::Admin)
    }
}

impl FromRequest for Auth {
    type Error = Error;
    type Future = Ready<Result<Self, Error>>;

    fn from_request(req: &HttpRequest, pl: &mut Payload) -> Self::Future {
        // Delegate to BearerAuth to parse the header.
        if let Ok(bearer) = BearerAuth::from_request(req, pl).into_inner() {
            return match decode_jwt(bearer.token()) {
                Ok(claims) => ready(Ok(Auth(claims))),
                Err(e) => {
                    tracing::debug!("rejected bearer token: {e}");
                    ready(Err(ApiError::Unauthorized.into()))
                }
            };
        }
        ready(Err(ApiError::Unauthorized.into()))
    }
}

/// Issue a token for `user_id`. Credential checks happen before this, in
/// whatever flow authenticated the user.
pub fn create_jwt(user_id: Id, roles: Vec<Role>) -> Result<String, jsonwebtoken::errors::Error> {
    let secret = secret()?;
    let expiration = (chrono::Utc::now() + chrono::Duration::hours(TOKEN_TTL_HOURS)).timestamp() as usize;

    let claims = Claims { sub: user_id.to_string(), exp: expiration, roles };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
}

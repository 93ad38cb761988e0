use chrono::Utc;
use hmac::{Hmac, Mac};
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::database::error::{Error, HtmlError};
use crate::database::schema::{UserRole, Uuid};

use super::permissions::ActionType;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Uuid,
    pub username: String,
    pub role: UserRole,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionData {
    pub user_id: Uuid,
    pub username: String,
    pub role: UserRole,
    pub is_admin: bool,
}

impl SessionData {
    pub fn authenticate(&self, action: ActionType) -> Result<(), Error> {
        if !action.authenticate(self) {
            return Err(HtmlError::Forbidden.default());
        }
        Ok(())
    }

    /// Whether the session may modify something owned by `owner_id`.
    pub fn can_manage(&self, owner_id: Uuid, own: ActionType, all: ActionType) -> bool {
        all.authenticate(self) || (owner_id == self.user_id && own.authenticate(self))
    }
}

impl From<JwtSessionData> for SessionData {
    fn from(value: JwtSessionData) -> Self {
        SessionData {
            username: value.username,
            user_id: value.user_id,
            is_admin: value.role == UserRole::Admin,
            role: value.role,
        }
    }
}

pub fn verify_jwt_session(token: &str, secret: &[u8]) -> Result<JwtSessionData, Error> {
    let key: Hmac<Sha256> = Hmac::new_from_slice(secret)
        .map_err(|_| Error::Config(String::from("Invalid session signing key")))?;

    let session: JwtSessionData = token
        .verify_with_key(&key)
        .map_err(|_| HtmlError::InvalidSession.new("Invalid session; Invalid token"))?;

    let now = Utc::now().timestamp();
    if (session.exp - now).is_negative() {
        return Err(HtmlError::InvalidSession.new("Invalid session; Token expired"));
    }

    Ok(session)
}


#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::test_support::{sign, TEST_SECRET};
    use super::*;

    #[test]
    fn accepts_valid_token() {
        let token = sign(4, UserRole::User, Duration::hours(1));
        let session: SessionData = verify_jwt_session(&token, TEST_SECRET.as_bytes())
            .unwrap()
            .into();

        assert_eq!(session.user_id, 4);
        assert_eq!(session.username, "user4");
        assert!(!session.is_admin);
    }

    #[test]
    fn rejects_expired_token() {
        let token = sign(4, UserRole::User, Duration::hours(-1));
        let error = verify_jwt_session(&token, TEST_SECRET.as_bytes()).unwrap_err();
        assert_eq!(error.to_string(), "Invalid session: Invalid session; Token expired");
    }

    #[test]
    fn rejects_token_signed_with_other_key() {
        let token = sign(4, UserRole::Admin, Duration::hours(1));
        let error = verify_jwt_session(&token, b"another-secret").unwrap_err();
        assert_eq!(error.code(), 401);
    }
}

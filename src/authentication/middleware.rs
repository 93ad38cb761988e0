use std::sync::Arc;

use warp::{reject::Rejection, Filter};

use super::jwt::{verify_jwt_session, SessionData};
use crate::{
    constants::{SESSION_COOKIE, SESSION_HEADER_PREFIX},
    error::{Error, HtmlError},
};

/// Extracts the caller's session from the `Authorization: Token <jwt>` header,
/// falling back to the session cookie. Rejects before the handler runs when
/// neither carries a valid token.
pub fn with_session(
    secret: Arc<str>,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(warp::cookie::optional::<String>(SESSION_COOKIE))
        .and_then(move |header: Option<String>, cookie: Option<String>| {
            let secret = secret.clone();
            async move {
                let token = header
                    .and_then(|h| h.strip_prefix(SESSION_HEADER_PREFIX).map(str::to_owned))
                    .or(cookie);

                match token {
                    Some(token) => verify_jwt_session(&token, secret.as_bytes())
                        .map(SessionData::from)
                        .map_err(Error::reject),
                    None => Err(HtmlError::Unauthorized.default().reject()),
                }
            }
        })
}

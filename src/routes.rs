use std::{convert::Infallible, sync::Arc};

use serde::Deserialize;
use warp::{
    http::StatusCode,
    reject::{MethodNotAllowed, Rejection},
    reply::{self, Reply, Response},
    Filter,
};

use crate::{
    config::ExportSettings,
    error::{Error, ErrorBody, HtmlError},
    export::export_shopping_list,
    jwt::SessionData,
    middleware::with_session,
    permissions::ActionType,
    renderer::ExportFormat,
    store::ShoppingListStore,
};

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

/// `GET /api/recipes/download_shopping_cart?format=pdf|txt`
pub fn download_shopping_cart<S>(
    store: Arc<S>,
    settings: Arc<ExportSettings>,
    secret: Arc<str>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone
where
    S: ShoppingListStore + 'static,
{
    warp::path!("api" / "recipes" / "download_shopping_cart")
        .and(warp::get())
        .and(with_session(secret))
        .and(warp::query::<ExportQuery>())
        .and_then(move |session: SessionData, query: ExportQuery| {
            let store = store.clone();
            let settings = settings.clone();
            async move {
                download(store.as_ref(), &session, query, &settings)
                    .await
                    .map_err(Error::reject)
            }
        })
}

async fn download<S>(
    store: &S,
    session: &SessionData,
    query: ExportQuery,
    settings: &ExportSettings,
) -> Result<Response, Error>
where
    S: ShoppingListStore + ?Sized,
{
    session.authenticate(ActionType::ExportShoppingList)?;

    let format = match query.format {
        Some(format) => format.parse::<ExportFormat>()?,
        None => settings.default_format,
    };

    let document = export_shopping_list(store, session.user_id, format, settings).await?;
    let disposition = document.content_disposition();

    let reply = reply::with_header(document.bytes, "content-type", document.content_type);
    let reply = reply::with_header(reply, "content-disposition", disposition);

    Ok(reply.into_response())
}

/// Turns rejections into `{"errors": "..."}` replies with the matching status.
pub async fn handle_rejection(rejection: Rejection) -> Result<Response, Infallible> {
    let (code, errors) = if let Some(error) = rejection.find::<Error>() {
        if error.code() >= 500 {
            log::error!("{error}");
        }
        (error.code(), error.public_info())
    } else if rejection.find::<MethodNotAllowed>().is_some() {
        (405, HtmlError::MethodNotAllowed.default().public_info())
    } else if rejection.is_not_found() {
        (404, HtmlError::NotFound.default().public_info())
    } else {
        (400, HtmlError::InvalidRequest.default().public_info())
    };

    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = reply::json(&ErrorBody { errors });

    Ok(reply::with_status(body, status).into_response())
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::{
        fixtures::{baking_store, MemoryStore},
        jwt::test_support::{sign, TEST_SECRET},
        schema::UserRole,
    };

    fn api(
        store: MemoryStore,
    ) -> impl Filter<Extract = (Response,), Error = Infallible> + Clone {
        download_shopping_cart(
            Arc::new(store),
            Arc::new(ExportSettings::default()),
            Arc::from(TEST_SECRET),
        )
        .recover(handle_rejection)
        .unify()
    }

    fn bearer(user_id: i32) -> String {
        format!("Token {}", sign(user_id, UserRole::User, Duration::hours(1)))
    }

    #[tokio::test]
    async fn anonymous_download_is_unauthorized() {
        let response = warp::test::request()
            .path("/api/recipes/download_shopping_cart?format=txt")
            .reply(&api(baking_store(1)))
            .await;

        assert_eq!(response.status(), 401);
        assert_eq!(
            response.body().as_ref(),
            br#"{"errors":"Authentication credentials were not provided"}"#
        );
    }

    #[tokio::test]
    async fn expired_session_is_unauthorized() {
        let token = sign(1, UserRole::User, Duration::hours(-1));
        let response = warp::test::request()
            .path("/api/recipes/download_shopping_cart")
            .header("authorization", format!("Token {token}"))
            .reply(&api(baking_store(1)))
            .await;

        assert_eq!(response.status(), 401);
    }

    #[tokio::test]
    async fn downloads_text_list() {
        let response = warp::test::request()
            .path("/api/recipes/download_shopping_cart?format=txt")
            .header("authorization", bearer(1))
            .reply(&api(baking_store(1)))
            .await;

        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()["content-type"], "text/plain");
        assert_eq!(
            response.headers()["content-disposition"],
            "attachment; filename=\"shopping_list.txt\""
        );
        assert_eq!(
            response.body().as_ref(),
            b"Egg - 2 pcs.\nFlour - 300 g.\nSugar - 50 g.\n"
        );
    }

    #[tokio::test]
    async fn defaults_to_pdf() {
        let response = warp::test::request()
            .path("/api/recipes/download_shopping_cart")
            .header("authorization", bearer(1))
            .reply(&api(baking_store(1)))
            .await;

        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()["content-type"], "application/pdf");
        assert_eq!(
            response.headers()["content-disposition"],
            "attachment; filename=\"list.pdf\""
        );
        assert!(response.body().starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn unknown_format_is_a_bad_request() {
        let response = warp::test::request()
            .path("/api/recipes/download_shopping_cart?format=docx")
            .header("authorization", bearer(1))
            .reply(&api(baking_store(1)))
            .await;

        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn post_is_method_not_allowed() {
        let response = warp::test::request()
            .method("POST")
            .path("/api/recipes/download_shopping_cart?format=txt")
            .header("authorization", bearer(1))
            .reply(&api(baking_store(1)))
            .await;

        assert_eq!(response.status(), 405);
        assert_eq!(
            response.body().as_ref(),
            br#"{"errors":"Method not allowed"}"#
        );
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let response = warp::test::request()
            .path("/api/recipes/download")
            .header("authorization", bearer(1))
            .reply(&api(baking_store(1)))
            .await;

        assert_eq!(response.status(), 404);
    }

    #[tokio::test]
    async fn storage_outage_is_service_unavailable() {
        let response = warp::test::request()
            .path("/api/recipes/download_shopping_cart?format=txt")
            .header("authorization", bearer(1))
            .reply(&api(MemoryStore::new().unavailable()))
            .await;

        assert_eq!(response.status(), 503);
        assert_eq!(
            response.body().as_ref(),
            br#"{"errors":"Service temporarily unavailable"}"#
        );
    }
}

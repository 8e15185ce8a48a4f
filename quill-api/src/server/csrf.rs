use crate::server::{Result, ServerError};
use axum::{
    extract::Request,
    http::{HeaderValue, header},
    middleware::Next,
    response::Response,
};
use headers::{Cookie, HeaderMapExt};
use quill_common::csrf::{CSRF_COOKIE_NAME, CsrfToken};
use tracing::warn;

pub async fn ensure_csrf_cookie(mut request: Request, next: Next) -> Response {
    let existing = request
        .headers()
        .typed_get::<Cookie>()
        .and_then(|cookie| cookie.get(CSRF_COOKIE_NAME).and_then(CsrfToken::from_cookie));

    let (token, is_new) = match existing {
        Some(token) => (token, false),
        None => (CsrfToken::generate_random(), true),
    };
    request.extensions_mut().insert(token.clone());

    let mut response = next.run(request).await;

    if is_new {
        let cookie = format!(
            "{CSRF_COOKIE_NAME}={}; Path=/; SameSite=Lax",
            token.as_str()
        );
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(err) => warn!(error = %err, "Could not encode CSRF cookie"),
        }
    }

    response
}

pub fn verify(expected: &CsrfToken, submitted: &str) -> Result<()> {
    if expected.matches(submitted) {
        Ok(())
    } else {
        Err(ServerError::CsrfFailure)
    }
}

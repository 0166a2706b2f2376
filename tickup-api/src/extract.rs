/// Request extractors
///
/// [`Json`] wraps `axum::Json` so that malformed or wrong-typed bodies are
/// reported through [`ApiError`] as `400 Bad Request` with the usual JSON
/// error body, instead of axum's plain-text `422`/`415` rejections.
///
/// It also serializes responses, so handlers import it in place of
/// `axum::Json`.

use crate::error::ApiError;
use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// JSON body extractor and response
#[derive(Debug, Clone, Copy, Default)]
pub struct Json<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for Json<T>
where
    axum::Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let axum::Json(value) = axum::Json::<T>::from_request(req, state).await?;
        Ok(Json(value))
    }
}

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

use crate::Links;
use crate::models::{
    DeletedResponse, LinkStats, LongUrlResponse, ShortUrlResponse, ShortenQuery, UpdateQuery,
    UpdatedLinkResponse,
};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::Redirect;
use shortly_derive::api_handler;
use shortly_domain::constants::LINKS_TAG;
use shortly_kernel::server::{ApiError, ApiState};

#[api_handler(
    post,
    path = "/api/shorten",
    params(ShortenQuery),
    responses(
        (status = OK, body = ShortUrlResponse),
        (status = BAD_REQUEST, description = "Not an absolute http(s) URL"),
    ),
    tag = LINKS_TAG,
)]
pub(crate) async fn shorten(
    State(state): State<ApiState>,
    Query(query): Query<ShortenQuery>,
) -> Result<Json<ShortUrlResponse>, ApiError> {
    let links = state.try_get_slice::<Links>()?;
    let shortened = links.shorten(&query.long_url).await?;
    Ok(Json(ShortUrlResponse { short_url: shortened.short_url().to_owned() }))
}

#[api_handler(
    get,
    path = "/api/{slug}",
    params(("slug" = String, Path)),
    responses((status = OK, body = LongUrlResponse), (status = NOT_FOUND, description = "Slug not found")),
    tag = LINKS_TAG,
)]
pub(crate) async fn get_long_url(
    State(state): State<ApiState>,
    Path(slug): Path<String>,
) -> Result<Json<LongUrlResponse>, ApiError> {
    let links = state.try_get_slice::<Links>()?;
    Ok(Json(LongUrlResponse { long_url: links.resolve(&slug).await? }))
}

#[api_handler(
    put,
    path = "/api/{slug}",
    params(("slug" = String, Path), UpdateQuery),
    responses(
        (status = OK, body = UpdatedLinkResponse),
        (status = BAD_REQUEST, description = "Not an absolute http(s) URL"),
        (status = NOT_FOUND, description = "Slug not found"),
        (status = CONFLICT, description = "URL owned by another slug"),
    ),
    tag = LINKS_TAG,
)]
pub(crate) async fn update_long_url(
    State(state): State<ApiState>,
    Path(slug): Path<String>,
    Query(query): Query<UpdateQuery>,
) -> Result<Json<UpdatedLinkResponse>, ApiError> {
    let links = state.try_get_slice::<Links>()?;
    let link = links.update(&slug, &query.new_long_url).await?;
    Ok(Json(UpdatedLinkResponse { short_url: link.short_url, long_url: link.long_url }))
}

#[api_handler(
    delete,
    path = "/api/{slug}",
    params(("slug" = String, Path)),
    responses((status = OK, body = DeletedResponse), (status = NOT_FOUND, description = "Slug not found")),
    tag = LINKS_TAG,
)]
pub(crate) async fn delete_short_url(
    State(state): State<ApiState>,
    Path(slug): Path<String>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let links = state.try_get_slice::<Links>()?;
    links.delete(&slug).await?;
    Ok(Json(DeletedResponse { message: "Short URL deleted successfully".to_owned() }))
}

#[api_handler(
    get,
    path = "/api/short.ly/{code}",
    params(("code" = String, Path)),
    responses(
        (status = TEMPORARY_REDIRECT, description = "Redirect to the long URL"),
        (status = NOT_FOUND, description = "Short URL not found"),
    ),
    tag = LINKS_TAG,
)]
pub(crate) async fn redirect_short_url(
    State(state): State<ApiState>,
    Path(code): Path<String>,
) -> Result<Redirect, ApiError> {
    let links = state.try_get_slice::<Links>()?;
    Ok(Redirect::temporary(&links.click(&code).await?))
}

#[api_handler(
    get,
    path = "/api/short.ly/{code}/stats",
    params(("code" = String, Path)),
    responses((status = OK, body = LinkStats), (status = NOT_FOUND, description = "Short URL not found")),
    tag = LINKS_TAG,
)]
pub(crate) async fn link_stats(
    State(state): State<ApiState>,
    Path(code): Path<String>,
) -> Result<Json<LinkStats>, ApiError> {
    let links = state.try_get_slice::<Links>()?;
    Ok(Json(links.stats(&code).await?))
}

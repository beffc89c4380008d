use shortly_derive::api_model;
use utoipa::IntoParams;

#[api_model]
#[derive(IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ShortenQuery {
    /// Absolute http(s) URL to shorten.
    pub long_url: String,
}

#[api_model]
#[derive(IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UpdateQuery {
    pub new_long_url: String,
}

#[api_model]
pub struct ShortUrlResponse {
    pub short_url: String,
}

#[api_model]
pub struct LongUrlResponse {
    pub long_url: String,
}

#[api_model]
pub struct UpdatedLinkResponse {
    pub short_url: String,
    pub long_url: String,
}

#[api_model]
pub struct DeletedResponse {
    pub message: String,
}

/// Click counters of one link.
#[api_model]
#[derive(Clone, PartialEq, Eq)]
pub struct LinkStats {
    pub click_count: i64,
    /// RFC 3339, absent until the first click.
    pub last_clicked_at: Option<String>,
}

#![allow(unreachable_pub)]
#![allow(clippy::needless_pass_by_value)]

//! # Macros
//!
//! Attribute macros shared by every crate of the workspace:
//!
//! * [`shortly_error`] turns an enum into a `thiserror` error with context support.
//! * [`shortly_slice`] declares the state handle of a feature slice.
//! * [`api_model`] / [`api_handler`] wire DTOs and handlers into `serde` and `utoipa`.
//! * [`main`] boots the tuned Tokio runtime (re-exported as `shortly_runtime::main`).
//!
//! The examples below are `ignore`d because they need the consuming crates in scope.

mod macros;

use proc_macro::TokenStream;
use syn::{DeriveInput, ItemFn, ItemStruct, parse_macro_input};

/// Bootstraps the Tokio runtime for an `async fn main`.
///
/// Profiles: `default`, `high_performance` (server), `memory_efficient` (tooling).
///
/// ```rust,ignore
/// #[shortly_runtime::main(high_performance)]
/// async fn main() -> anyhow::Result<()> {
///     Ok(())
/// }
/// ```
#[proc_macro_attribute]
pub fn main(args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);
    macros::runtime::expand_main(args.into(), input).into()
}

/// Declares an API data transfer object.
///
/// Injects `Debug`, `Serialize`, `Deserialize` and `utoipa::ToSchema` when missing,
/// `rename_all = "snake_case"` and `deny_unknown_fields`. Both can be overridden:
///
/// ```rust,ignore
/// #[api_model(rename_all = "camelCase", deny_unknown_fields = false)]
/// pub struct ShortenResponse {
///     pub short_url: String,
/// }
/// ```
#[proc_macro_attribute]
pub fn api_model(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemStruct);
    macros::api::expand_api_model(attr.into(), input).into()
}

/// Registers an Axum handler with `utoipa::path`.
///
/// Accepts the same arguments as `utoipa::path`.
///
/// ```rust,ignore
/// #[api_handler(get, path = "/health", responses((status = OK, body = HealthResponse)), tag = SYSTEM_TAG)]
/// pub(crate) async fn health() -> Json<HealthResponse> { .. }
/// ```
#[proc_macro_attribute]
pub fn api_handler(args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);
    macros::api::expand_api_handler(args.into(), input).into()
}

/// Defines a domain error enum.
///
/// Every variant uses named fields. Variants carrying a `source` (or a field marked
/// `#[source]`/`#[from]`) must also carry `context: Option<Cow<'static, str>>`.
///
/// Generated items:
/// * `#[derive(Debug, thiserror::Error)]` unless already present.
/// * `<Name>Ext::context(..)` for `Result<T, Name>` and `Result<T, Source>`.
/// * `From<Source>` for each source variant.
/// * `From<&'static str>` / `From<String>` when an `Internal` variant exists.
/// * `Name::kind()` returning the snake_case variant name.
/// * a private `format_context` helper used in the `#[error(..)]` strings.
///
/// ```rust,ignore
/// #[shortly_error]
/// pub enum LinkError {
///     #[error("Link not found{}: {message}", format_context(.context))]
///     NotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
///
///     #[error("Database error{}: {source}", format_context(.context))]
///     Database { source: surrealdb::Error, context: Option<Cow<'static, str>> },
/// }
/// ```
#[proc_macro_attribute]
pub fn shortly_error(_args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    macros::error::expand_derive(input).into()
}

/// Declares the shared state of a feature slice.
///
/// Generates `<Name>Inner` with the declared fields, an `Arc` handle `<Name>`
/// that derefs to it, the `FeatureSlice` impl and `From<Name> for InitializedSlice`.
///
/// ```rust,ignore
/// #[shortly_derive::shortly_slice]
/// pub struct Links {
///     pub repository: LinkRepository,
/// }
///
/// let slice: InitializedSlice = Links::new(LinksInner { repository }).into();
/// ```
#[proc_macro_attribute]
pub fn shortly_slice(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemStruct);
    macros::slice::expand_slice(input).into()
}

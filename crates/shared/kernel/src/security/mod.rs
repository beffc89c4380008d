pub mod token;

pub use token::{Claims, Principal, TokenError, TokenService};

use shortly_derive::api_model;
use utoipa::IntoParams;

#[api_model(deny_unknown_fields = false)]
#[derive(IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ChatQuery {
    /// Access token; surrounding quotes are ignored.
    pub token: Option<String>,
}

impl ChatQuery {
    /// The token without whitespace or the quotes some clients wrap it in.
    #[must_use]
    pub fn bare_token(&self) -> Option<&str> {
        self.token
            .as_deref()
            .map(|t| t.trim().trim_matches(|c| c == '"' || c == '\''))
            .filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(token: Option<&str>) -> ChatQuery {
        ChatQuery { token: token.map(Into::into) }
    }

    #[test]
    fn strips_quotes_and_whitespace() {
        assert_eq!(query(Some("\"abc.def\"")).bare_token(), Some("abc.def"));
        assert_eq!(query(Some(" 'abc' ")).bare_token(), Some("abc"));
        assert_eq!(query(Some("abc")).bare_token(), Some("abc"));
    }

    #[test]
    fn empty_tokens_are_missing() {
        assert_eq!(query(Some("\"\"")).bare_token(), None);
        assert_eq!(query(None).bare_token(), None);
    }
}

use shortly_derive::shortly_error;
use std::borrow::Cow;

#[shortly_error]
pub enum DemoError {
    #[error("IO error{}: {source}", format_context(.context))]
    Io {
        #[source]
        source: std::io::Error,
        context: Option<Cow<'static, str>>,
    },

    #[error("Not found{}: {message}", format_context(.context))]
    NotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn read() -> Result<(), DemoError> {
    let io: Result<(), std::io::Error> = Err(std::io::Error::other("boom"));
    io.context("reading fixture")
}

fn main() {
    let err = read().unwrap_err();
    assert_eq!(err.kind(), "io");
    assert_eq!(err.to_string(), "IO error (reading fixture): boom");

    let err: DemoError = "unexpected".into();
    assert_eq!(err.kind(), "internal");

    let err = Err::<(), _>(DemoError::NotFound { message: "slug".into(), context: None })
        .context("resolve")
        .unwrap_err();
    assert_eq!(err.kind(), "not_found");
    assert_eq!(err.to_string(), "Not found (resolve): slug");
}

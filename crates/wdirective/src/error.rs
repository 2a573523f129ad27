//! Errors

/// Errors surfaced by the directive runtime.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("already listening, call `disconnect` before listening again")]
    AlreadyListening,

    #[error("no directive hook is currently running")]
    MissingContext,

    #[error("no listen target was given and the platform has no default target")]
    NoTarget,

    #[error("platform failure: {0}")]
    Platform(String),

    #[error("could not read options: {0}")]
    Options(#[from] serde_json::Error),
}

#[cfg(feature = "web")]
impl From<wasm_bindgen::JsValue> for Error {
    fn from(value: wasm_bindgen::JsValue) -> Self {
        Error::Platform(format!("{value:?}"))
    }
}

use std::error;
use std::fmt;
use std::io;

use taxidash_common::errors::ConfigError;


#[derive(Debug)]
pub(crate) enum WebError {
    Config(ConfigError),
    ConfigAlreadySet,
    Binding(io::Error),
}
impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::Config(e)
                => write!(f, "configuration error: {}", e),
            WebError::ConfigAlreadySet
                => write!(f, "configuration has already been set"),
            WebError::Binding(e)
                => write!(f, "error binding listening socket: {}", e),
        }
    }
}
impl error::Error for WebError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            WebError::Config(e) => Some(e),
            WebError::ConfigAlreadySet => None,
            WebError::Binding(e) => Some(e),
        }
    }
}

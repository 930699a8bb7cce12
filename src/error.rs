#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("corrupt store: {0}")]
    CorruptStore(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("city [{city}] {op}: {source}")]
    City {
        city: String,
        op: &'static str,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn in_city(self, city: &str, op: &'static str) -> Self {
        Error::City {
            city: city.to_string(),
            op,
            source: Box::new(self),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::StorageUnavailable(e.to_string())
    }
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        Error::StorageUnavailable(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

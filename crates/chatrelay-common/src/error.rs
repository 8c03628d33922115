use thiserror::Error;

/// Errors shared across chatrelay crates.
#[derive(Debug, Error)]
pub enum Error {
    /// The upstream API refused the request for quota or frequency reasons.
    #[error("rate limited: {status_text}")]
    RateLimited { status_text: String },

    /// Every credential in the pool was tried during the current saturation episode.
    #[error("all {attempts} credentials exhausted: {status_text}")]
    Exhausted { attempts: usize, status_text: String },

    /// Non rate-limit HTTP failure from the upstream API.
    #[error("upstream API error: status={status}, body={message}")]
    Upstream { status: u16, message: String },

    /// The request never produced an HTTP response.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("agent error: {0}")]
    Agent(String),

    #[error("channel error: {0}")]
    Channel(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_display_includes_attempts() {
        let err = Error::Exhausted {
            attempts: 3,
            status_text: "Too Many Requests".into(),
        };
        assert_eq!(err.to_string(), "all 3 credentials exhausted: Too Many Requests");
    }

    #[test]
    fn upstream_display_includes_status() {
        let err = Error::Upstream {
            status: 401,
            message: "bad key".into(),
        };
        assert_eq!(err.to_string(), "upstream API error: status=401, body=bad key");
    }
}

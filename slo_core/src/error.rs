use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Required environment variables are not set: {}", .0.join(", "))]
    MissingVariables(Vec<&'static str>),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

#[derive(Error, Debug)]
pub enum ClientInitError {
    #[error("Invalid API base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Failure of a single SLO history request.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Error when calling `{call}`: {message}")]
    Transport { call: &'static str, message: String },

    #[error("Error when calling `{call}`: HTTP {code}: {body}")]
    Status {
        call: &'static str,
        code: u16,
        body: String,
    },

    #[error("Unexpected `{call}` response (HTTP {status}): {reason}")]
    Malformed {
        call: &'static str,
        status: u16,
        reason: String,
    },
}

impl FetchError {
    pub fn call(&self) -> &'static str {
        match self {
            FetchError::Transport { call, .. }
            | FetchError::Status { call, .. }
            | FetchError::Malformed { call, .. } => call,
        }
    }

    /// HTTP status code as a label value, `"0"` when no response was received.
    pub fn status_label(&self) -> String {
        match self {
            FetchError::Transport { .. } => "0".to_string(),
            FetchError::Status { code, .. } => code.to_string(),
            FetchError::Malformed { status, .. } => status.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_label() {
        let err = FetchError::Transport {
            call: "GetSLOHistory",
            message: "connection refused".to_string(),
        };
        assert_eq!(err.status_label(), "0");

        let err = FetchError::Status {
            call: "GetSLOHistory",
            code: 403,
            body: "Forbidden".to_string(),
        };
        assert_eq!(err.status_label(), "403");
        assert_eq!(err.call(), "GetSLOHistory");
    }

    #[test]
    fn test_missing_variables_message() {
        let err = ConfigError::MissingVariables(vec!["DD_API_KEY", "DD_SLO_ID"]);
        assert_eq!(
            err.to_string(),
            "Required environment variables are not set: DD_API_KEY, DD_SLO_ID"
        );
    }
}

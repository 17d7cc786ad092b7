//! Credentials error types

use std::path::PathBuf;

use thiserror::Error;

/// Result type for credentials resolution
pub type CredentialsResult<T> = Result<T, CredentialsError>;

/// Failures while reading or resolving the credentials file
#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("failed to read credentials file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse credentials file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("database '{database}' not found in {path}")]
    DatabaseNotFound { database: String, path: PathBuf },

    #[error("option '{option}' missing in section [{section}]")]
    MissingOption { section: String, option: String },

    #[error("section [{section}] referenced by database '{database}' not found in {path}")]
    MissingSection {
        section: String,
        path: PathBuf,
        database: String,
    },

    #[error("option '{option}' in section [{section}] has invalid value '{value}'")]
    InvalidOption {
        section: String,
        option: String,
        value: String,
    },

    #[error("no home directory found; pass an explicit credentials path")]
    NoHomeDirectory,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_culprit() {
        let err = CredentialsError::DatabaseNotFound {
            database: "twitter".into(),
            path: PathBuf::from("/tmp/creds.toml"),
        };
        assert_eq!(err.to_string(), "database 'twitter' not found in /tmp/creds.toml");

        let err = CredentialsError::MissingOption {
            section: "twitter".into(),
            option: "rpwd".into(),
        };
        assert!(err.to_string().contains("rpwd"));
        assert!(err.to_string().contains("[twitter]"));
    }
}

//! Connection layer
//!
//! Resolves credentials, opens a driver connection and runs filters over one
//! or many collections.

mod connection;
mod credentials;
mod errors;

pub use connection::{CollectionScope, Connection};
pub use credentials::{
    default_credentials_path, expand_home, load_target, resolve_target, ConnectionTarget,
    DEFAULT_CREDENTIALS_FILE,
};
pub use errors::{CredentialsError, CredentialsResult};

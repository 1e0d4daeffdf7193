//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports from the [`secrecy`] crate. Use these types for every
//! sensitive value the service touches: the Zoom client secret, acquired
//! access tokens, and the redis URL (which may embed credentials, e.g.
//! `redis://:password@host:6379`).
//!
//! `SecretString` implements `Debug` with redaction, so any struct that
//! derives `Debug` while holding one cannot leak the value through `{:?}`
//! or tracing fields. Secrets are zeroized on drop. Reading the value
//! requires an explicit `expose_secret()` call at the use site.

pub use secrecy::{ExposeSecret, SecretString};

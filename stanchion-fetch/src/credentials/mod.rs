//! Credential pool and live probes.

pub mod pool;
pub mod probe;

pub use pool::{
    Credential, CredentialPool, CredentialStatus, PoolSettings, ValidationReport, mask_secret,
};
pub use probe::{CredentialProbe, ProbeVerdict, is_auth_message};

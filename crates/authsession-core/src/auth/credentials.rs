use std::sync::Arc;

use anyhow::Result;

use super::store::KeyValueStore;
use crate::token::Credential;

/// Name of the slot holding the current credential
pub const CREDENTIAL_KEY: &str = "authToken";

/// Persists a single credential string in a key-value store.
///
/// Purely persistence: no expiry checks happen here.
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Store the credential, replacing any previous one
    pub fn save(&self, credential: &Credential) -> Result<()> {
        self.backend.set(CREDENTIAL_KEY, credential.as_str())
    }

    /// Load the stored credential, if any
    pub fn load(&self) -> Result<Option<Credential>> {
        Ok(self.backend.get(CREDENTIAL_KEY)?.map(Credential::from))
    }

    /// Delete the stored credential
    pub fn clear(&self) -> Result<()> {
        self.backend.remove(CREDENTIAL_KEY)
    }
}

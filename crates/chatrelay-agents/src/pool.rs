use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chatrelay_common::{Error, Result};
use chatrelay_security::mask_secret;
use futures::future::join_all;
use tracing::{info, warn};

use crate::openai::OpenAiProvider;
use crate::providers::LlmProvider;

/// One API credential and the endpoint it is used against.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialSlot {
    secret: String,
    endpoint: Option<String>,
}

impl CredentialSlot {
    pub fn new(secret: impl Into<String>, endpoint: Option<String>) -> Self {
        Self {
            secret: secret.into(),
            endpoint,
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Base URL override; `None` means the provider default.
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Log-safe label for this credential.
    pub fn masked(&self) -> String {
        mask_secret(&self.secret)
    }
}

impl fmt::Debug for CredentialSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSlot")
            .field("secret", &self.masked())
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// A credential slot together with the client bound to it.
#[derive(Clone)]
pub struct PooledClient {
    pub index: usize,
    pub slot: CredentialSlot,
    pub provider: Arc<dyn LlmProvider>,
}

impl fmt::Debug for PooledClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledClient")
            .field("index", &self.index)
            .field("slot", &self.slot)
            .field("provider", &self.provider.provider_id())
            .finish()
    }
}

/// Fixed, ordered set of credentials with a shared active cursor.
pub struct ClientPool {
    entries: Vec<(CredentialSlot, Arc<dyn LlmProvider>)>,
    cursor: Mutex<usize>,
}

impl ClientPool {
    /// Build one OpenAI client per credential.
    pub fn from_slots(slots: Vec<CredentialSlot>, timeout: Duration) -> Result<Self> {
        let mut entries: Vec<(CredentialSlot, Arc<dyn LlmProvider>)> =
            Vec::with_capacity(slots.len());
        for slot in slots {
            let provider = OpenAiProvider::with_timeout(
                slot.secret().to_string(),
                slot.endpoint().map(str::to_string),
                timeout,
            )?;
            entries.push((slot, Arc::new(provider)));
        }
        Self::with_providers(entries)
    }

    /// Build a pool from pre-constructed clients. Fails when empty.
    pub fn with_providers(entries: Vec<(CredentialSlot, Arc<dyn LlmProvider>)>) -> Result<Self> {
        if entries.is_empty() {
            return Err(Error::Config(
                "credential pool is empty: configure at least one API key".into(),
            ));
        }
        info!("credential pool ready with {} slots", entries.len());
        Ok(Self {
            entries,
            cursor: Mutex::new(0),
        })
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Index of the currently active slot.
    pub fn cursor(&self) -> usize {
        *self.lock()
    }

    pub fn active(&self) -> PooledClient {
        let index = *self.lock();
        self.client_at(index)
    }

    /// Advance the shared cursor to the next slot, wrapping around, and
    /// return the new active client.
    pub fn rotate(&self) -> PooledClient {
        let index = {
            let mut cursor = self.lock();
            *cursor = (*cursor + 1) % self.entries.len();
            *cursor
        };
        let client = self.client_at(index);
        info!(
            "rotated to credential {} ({}/{})",
            client.slot.masked(),
            index + 1,
            self.entries.len()
        );
        client
    }

    /// Probe every slot concurrently. Returns `(masked credential, healthy)`
    /// in pool order.
    pub async fn health_check_all(&self) -> Vec<(String, bool)> {
        let checks = self.entries.iter().map(|(slot, provider)| async move {
            let healthy = match provider.health_check().await {
                Ok(ok) => ok,
                Err(e) => {
                    warn!("health check for {} failed: {}", slot.masked(), e);
                    false
                }
            };
            (slot.masked(), healthy)
        });
        join_all(checks).await
    }

    fn client_at(&self, index: usize) -> PooledClient {
        let (slot, provider) = &self.entries[index];
        PooledClient {
            index,
            slot: slot.clone(),
            provider: Arc::clone(provider),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, usize> {
        self.cursor.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots(n: usize) -> Vec<CredentialSlot> {
        (0..n)
            .map(|i| CredentialSlot::new(format!("sk-test-key-{i:02}"), None))
            .collect()
    }

    #[test]
    fn empty_pool_is_a_config_error() {
        let err = ClientPool::from_slots(Vec::new(), Duration::from_secs(5))
            .err()
            .expect("empty pool must fail");
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn active_starts_at_first_slot() {
        let pool = ClientPool::from_slots(slots(3), Duration::from_secs(5)).unwrap();
        let active = pool.active();
        assert_eq!(active.index, 0);
        assert_eq!(active.slot.secret(), "sk-test-key-00");
    }

    #[test]
    fn rotate_wraps_around() {
        let pool = ClientPool::from_slots(slots(3), Duration::from_secs(5)).unwrap();
        assert_eq!(pool.rotate().index, 1);
        assert_eq!(pool.rotate().index, 2);
        assert_eq!(pool.rotate().index, 0);
        assert_eq!(pool.cursor(), 0);
    }

    #[test]
    fn rotation_is_shared_between_callers() {
        let pool = Arc::new(ClientPool::from_slots(slots(2), Duration::from_secs(5)).unwrap());
        let other = Arc::clone(&pool);
        other.rotate();
        assert_eq!(pool.active().slot.secret(), "sk-test-key-01");
    }

    #[test]
    fn single_slot_pool_rotates_onto_itself() {
        let pool = ClientPool::from_slots(slots(1), Duration::from_secs(5)).unwrap();
        assert_eq!(pool.rotate().index, 0);
    }

    #[test]
    fn debug_output_masks_secret() {
        let slot = CredentialSlot::new("sk-abcdefghijklmnopqrstuvwxyz", None);
        let printed = format!("{slot:?}");
        assert!(!printed.contains("abcdefghijklmnop"));
        assert!(printed.contains("sk-a..."));
    }
}

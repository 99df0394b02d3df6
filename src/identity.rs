use tracing::{info, warn};
use uuid::Uuid;

use crate::storage::{Repository, Store};

/// Resolves who owns newly created sessions. Opaque to the engine.
pub trait IdentityProvider {
    fn resolve_owner_id(&self) -> String;
}

/// Linked account id when there is one, otherwise a per-device anonymous id.
#[derive(Debug, Clone)]
pub struct LocalIdentity {
    account_id: Option<String>,
    device_id: String,
}

impl LocalIdentity {
    pub fn load_or_create<S: Store>(repo: &Repository<S>, account_id: Option<String>) -> Self {
        let device_id = match repo.load_device_id() {
            Some(id) => id,
            None => {
                let id = format!("anon-{}", Uuid::new_v4());
                match repo.save_device_id(&id) {
                    Ok(()) => info!(device_id = %id, "created anonymous device id"),
                    Err(err) => warn!(error = %err, "could not persist device id"),
                }
                id
            }
        };
        Self {
            account_id: account_id.filter(|id| !id.trim().is_empty()),
            device_id,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }
}

impl IdentityProvider for LocalIdentity {
    fn resolve_owner_id(&self) -> String {
        self.account_id
            .clone()
            .unwrap_or_else(|| self.device_id.clone())
    }
}

/// Always the same owner.
#[derive(Debug, Clone)]
pub struct StaticIdentity(pub String);

impl IdentityProvider for StaticIdentity {
    fn resolve_owner_id(&self) -> String {
        self.0.clone()
    }
}

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;

use glimpse_types::models::Profile;

/// Read side of the user directory; used only to decorate output.
pub trait ProfileLookup: Send + Sync {
    fn get_profile(&self, user_id: &str) -> Result<Option<Profile>>;
}

/// Writable user directory, for deployments that keep profiles locally.
pub trait ProfileDirectory: ProfileLookup {
    fn upsert_profile(&self, profile: Profile) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryProfiles {
    profiles: RwLock<HashMap<String, Profile>>,
}

impl MemoryProfiles {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProfileLookup for MemoryProfiles {
    fn get_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        Ok(self
            .profiles
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(user_id)
            .cloned())
    }
}

impl ProfileDirectory for MemoryProfiles {
    fn upsert_profile(&self, profile: Profile) -> Result<()> {
        self.profiles
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(profile.user_id.clone(), profile);
        Ok(())
    }
}

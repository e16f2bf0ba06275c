//! Player Profiles
//!
//! Level and experience persistence behind the [`ProfileStore`] trait. The
//! session only loads a level at match start and credits experience after a
//! win; storage layout is the store's business.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::network::protocol::ProfileSummary;

/// Level assigned to a username seen for the first time.
pub const STARTING_LEVEL: u32 = 1;

/// Experience required to advance from `level` to the next one.
///
/// Level 1 needs 100; level n > 1 needs `floor(100 × 1.1^(n−1))`.
pub fn required_exp_for_level(level: u32) -> u32 {
    if level <= 1 {
        return 100;
    }
    (100.0 * 1.1f64.powi(level as i32 - 1)).floor() as u32
}

/// Profile store errors.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("profile store is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("invalid username")]
    InvalidUsername,
    #[error("profile store lock poisoned")]
    Poisoned,
}

/// A stored player record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "Level")]
    pub level: u32,
    #[serde(rename = "Exp")]
    pub exp: u32,
    #[serde(rename = "LastSeen", default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

impl Profile {
    /// A fresh level-1 profile.
    pub fn new(username: &str) -> Self {
        Self {
            username: username.to_string(),
            level: STARTING_LEVEL,
            exp: 0,
            last_seen: None,
        }
    }

    /// Level and progress for display.
    pub fn summary(&self) -> ProfileSummary {
        ProfileSummary {
            level: self.level,
            exp: self.exp,
            exp_needed: required_exp_for_level(self.level),
        }
    }

    /// Add experience, levelling up while the threshold is met. Excess carries over.
    pub fn add_experience(&mut self, amount: u32) -> ExperienceAward {
        let start_level = self.level;
        self.exp += amount;
        let mut required = required_exp_for_level(self.level);
        while self.exp >= required {
            self.exp -= required;
            self.level += 1;
            required = required_exp_for_level(self.level);
        }
        ExperienceAward {
            level: self.level,
            exp: self.exp,
            leveled_up: self.level > start_level,
        }
    }
}

/// Result of crediting experience.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExperienceAward {
    /// Level after the award
    pub level: u32,
    /// Experience toward the next level
    pub exp: u32,
    /// Did at least one level-up happen?
    pub leveled_up: bool,
}

impl ExperienceAward {
    /// Level and progress for display.
    pub fn summary(&self) -> ProfileSummary {
        ProfileSummary {
            level: self.level,
            exp: self.exp,
            exp_needed: required_exp_for_level(self.level),
        }
    }
}

/// Persistence collaborator for player progression.
///
/// Calls are short and synchronous; implementations guard their own state.
pub trait ProfileStore: Send + Sync {
    /// Load (creating if absent) the profile for a username.
    fn load_profile(&self, username: &str) -> Result<Profile, ProfileError>;

    /// Credit experience and persist the result.
    fn award_experience(&self, username: &str, amount: u32) -> Result<ExperienceAward, ProfileError>;
}

fn validate_username(username: &str) -> Result<(), ProfileError> {
    if username.trim().is_empty() || username.len() > 32 {
        return Err(ProfileError::InvalidUsername);
    }
    Ok(())
}

// =============================================================================
// IN-MEMORY STORE
// =============================================================================

/// Profiles kept for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    profiles: Mutex<BTreeMap<String, Profile>>,
}

impl MemoryProfileStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a profile (tests and fixtures).
    pub fn insert(&self, profile: Profile) {
        if let Ok(mut profiles) = self.profiles.lock() {
            profiles.insert(profile.username.clone(), profile);
        }
    }
}

impl ProfileStore for MemoryProfileStore {
    fn load_profile(&self, username: &str) -> Result<Profile, ProfileError> {
        validate_username(username)?;
        let mut profiles = self.profiles.lock().map_err(|_| ProfileError::Poisoned)?;
        let profile = profiles
            .entry(username.to_string())
            .or_insert_with(|| Profile::new(username));
        profile.last_seen = Some(Utc::now());
        Ok(profile.clone())
    }

    fn award_experience(&self, username: &str, amount: u32) -> Result<ExperienceAward, ProfileError> {
        validate_username(username)?;
        let mut profiles = self.profiles.lock().map_err(|_| ProfileError::Poisoned)?;
        let profile = profiles
            .entry(username.to_string())
            .or_insert_with(|| Profile::new(username));
        Ok(profile.add_experience(amount))
    }
}

// =============================================================================
// JSON FILE STORE
// =============================================================================

/// Profiles persisted as a JSON object keyed by username (`players.json`).
///
/// The whole file is re-read and rewritten on every update, under one lock.
#[derive(Debug)]
pub struct JsonProfileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonProfileStore {
    /// Store backed by `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, Profile>, ProfileError> {
        match std::fs::read_to_string(&self.path) {
            Ok(data) if data.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(data) => Ok(serde_json::from_str(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, profiles: &BTreeMap<String, Profile>) -> Result<(), ProfileError> {
        let data = serde_json::to_string_pretty(profiles)?;
        std::fs::write(&self.path, data)?;
        Ok(())
    }

    fn update<T>(&self, username: &str, f: impl FnOnce(&mut Profile) -> T) -> Result<T, ProfileError> {
        validate_username(username)?;
        let _guard = self.lock.lock().map_err(|_| ProfileError::Poisoned)?;

        let mut profiles = self.read_all()?;
        let profile = profiles.entry(username.to_string()).or_insert_with(|| {
            info!("Registering new player {}", username);
            Profile::new(username)
        });
        let out = f(profile);
        self.write_all(&profiles)?;
        debug!("Saved {} profiles to {}", profiles.len(), self.path.display());
        Ok(out)
    }
}

impl ProfileStore for JsonProfileStore {
    fn load_profile(&self, username: &str) -> Result<Profile, ProfileError> {
        self.update(username, |profile| {
            profile.last_seen = Some(Utc::now());
            profile.clone()
        })
    }

    fn award_experience(&self, username: &str, amount: u32) -> Result<ExperienceAward, ProfileError> {
        self.update(username, |profile| {
            profile.last_seen = Some(Utc::now());
            profile.add_experience(amount)
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_curve() {
        assert_eq!(required_exp_for_level(1), 100);
        assert_eq!(required_exp_for_level(2), 110);
        assert_eq!(required_exp_for_level(3), 121);
        assert_eq!(required_exp_for_level(4), 133);
    }

    #[test]
    fn test_add_experience_carries_over() {
        let mut profile = Profile::new("alice");
        let award = profile.add_experience(30);
        assert_eq!(award, ExperienceAward { level: 1, exp: 30, leveled_up: false });

        profile.exp = 90;
        let award = profile.add_experience(30);
        assert_eq!(award, ExperienceAward { level: 2, exp: 20, leveled_up: true });
    }

    #[test]
    fn test_add_experience_multiple_levels() {
        let mut profile = Profile::new("bob");
        // 100 + 110 + 5
        let award = profile.add_experience(215);
        assert_eq!(award.level, 3);
        assert_eq!(award.exp, 5);
        assert!(award.leveled_up);
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryProfileStore::new();
        let profile = store.load_profile("carol").unwrap();
        assert_eq!(profile.level, 1);
        assert!(profile.last_seen.is_some());

        for _ in 0..4 {
            store.award_experience("carol", 30).unwrap();
        }
        let profile = store.load_profile("carol").unwrap();
        assert_eq!(profile.level, 2);
        assert_eq!(profile.exp, 20);

        assert!(matches!(store.load_profile("  "), Err(ProfileError::InvalidUsername)));
    }

    #[test]
    fn test_json_store_persists() {
        let path = std::env::temp_dir().join(format!("lane-clash-{}.json", uuid::Uuid::new_v4()));
        {
            let store = JsonProfileStore::new(&path);
            assert_eq!(store.load_profile("dave").unwrap().level, 1);
            store.award_experience("dave", 100).unwrap();
        }

        let store = JsonProfileStore::new(&path);
        let profile = store.load_profile("dave").unwrap();
        assert_eq!(profile.level, 2);
        assert_eq!(profile.exp, 0);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"Username\": \"dave\""));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_json_store_reads_legacy_records() {
        let path = std::env::temp_dir().join(format!("lane-clash-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            r#"{"erin": {"Username": "erin", "Password": "", "ClientKey": "C4", "Level": 3, "Exp": 12}}"#,
        )
        .unwrap();

        let store = JsonProfileStore::new(&path);
        let profile = store.load_profile("erin").unwrap();
        assert_eq!(profile.level, 3);
        assert_eq!(profile.exp, 12);
        let _ = std::fs::remove_file(&path);
    }
}

//! In-memory registries for studies and accounts.
//!
//! Each registry guards exactly one map behind its own lock and hands out clones,
//! so a reader never sees a record that is halfway through being replaced. Handles
//! are cheap to clone and share the same underlying map.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{Error, Result};
use crate::models::{Study, User};

// ============================================================
// Studies
// ============================================================

#[derive(Default)]
pub struct StudyStore {
    studies: Arc<RwLock<HashMap<String, Study>>>,
}

impl StudyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Result<Study> {
        let studies = self.studies.read().expect("study store lock poisoned");
        studies
            .get(id)
            .cloned()
            .ok_or_else(|| Error::study_not_found(id))
    }

    /// Insert or wholesale-replace the study stored under `id`.
    pub fn put(&self, id: impl Into<String>, study: Study) {
        let mut studies = self.studies.write().expect("study store lock poisoned");
        studies.insert(id.into(), study);
    }

    /// Store `study` under `id` unless something is already there, and return
    /// whatever ends up stored.
    pub fn get_or_insert(&self, id: impl Into<String>, study: Study) -> Study {
        let mut studies = self.studies.write().expect("study store lock poisoned");
        studies.entry(id.into()).or_insert(study).clone()
    }

    pub fn contains(&self, id: &str) -> bool {
        let studies = self.studies.read().expect("study store lock poisoned");
        studies.contains_key(id)
    }

    pub fn len(&self) -> usize {
        let studies = self.studies.read().expect("study store lock poisoned");
        studies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Clone for StudyStore {
    fn clone(&self) -> Self {
        Self {
            studies: self.studies.clone(),
        }
    }
}

// ============================================================
// Users
// ============================================================

#[derive(Default)]
pub struct UserDirectory {
    users: Arc<RwLock<HashMap<String, User>>>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absence is a normal outcome here, not an error.
    pub fn find(&self, username: &str) -> Option<User> {
        let users = self.users.read().expect("user directory lock poisoned");
        users.get(username).cloned()
    }

    /// Insert or replace the record keyed by `user.username`.
    pub fn upsert(&self, user: User) {
        let mut users = self.users.write().expect("user directory lock poisoned");
        users.insert(user.username.clone(), user);
    }

    /// Insert only if the username is free. Returns `false` and leaves the existing
    /// record untouched otherwise.
    pub fn insert_new(&self, user: User) -> bool {
        let mut users = self.users.write().expect("user directory lock poisoned");
        if users.contains_key(&user.username) {
            return false;
        }
        users.insert(user.username.clone(), user);
        true
    }

    pub fn len(&self) -> usize {
        let users = self.users.read().expect("user directory lock poisoned");
        users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Clone for UserDirectory {
    fn clone(&self) -> Self {
        Self {
            users: self.users.clone(),
        }
    }
}

//! # Domain Types
//!
//! Core domain types used throughout Keel.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────────┐   ┌──────────────────┐  │
//! │  │ AccountIdentity │   │   PendingRecord     │   │  UploadRequest   │  │
//! │  │  ─────────────  │   │  ─────────────────  │   │  ──────────────  │  │
//! │  │  opaque string  │◄──│  account            │──►│  five fields     │  │
//! │  │                 │   │  repo_id            │   │  is_auto_update  │  │
//! │  └─────────────────┘   │  repo_name          │   └──────────────────┘  │
//! │                        │  parent_dir         │                          │
//! │                        │  local_path         │                          │
//! │                        │  (cached hash)      │                          │
//! │                        └─────────────────────┘                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! A `PendingRecord` is identified by the values of all five fields. Two
//! records built separately from equal strings are the same record. Completion
//! notifications match on four fields (`repo_name` is display-only for the
//! transfer service and is not reported back).

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::ValidationError;

// =============================================================================
// Account Identity
// =============================================================================

/// Opaque identity of the remote account/session that owns a job.
///
/// Compared by value; the scheduler never looks inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountIdentity(String);

impl AccountIdentity {
    /// Wraps an account signature.
    pub fn new(signature: impl Into<String>) -> Self {
        AccountIdentity(signature.into())
    }

    /// Returns the underlying signature.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the signature is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AccountIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountIdentity {
    fn from(s: &str) -> Self {
        AccountIdentity::new(s)
    }
}

impl From<String> for AccountIdentity {
    fn from(s: String) -> Self {
        AccountIdentity(s)
    }
}

// =============================================================================
// Pending Record
// =============================================================================

/// One outstanding auto-update job.
///
/// Immutable once built. The hash is computed in the constructor and cached,
/// so set lookups never rehash the strings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(from = "RecordFields")]
pub struct PendingRecord {
    account: AccountIdentity,
    repo_id: String,
    repo_name: String,
    parent_dir: String,
    local_path: String,

    #[serde(skip_serializing)]
    hash: u64,
}

/// Wire shape of a record; deserialization goes through the constructor.
#[derive(Deserialize)]
struct RecordFields {
    account: AccountIdentity,
    repo_id: String,
    repo_name: String,
    parent_dir: String,
    local_path: String,
}

impl From<RecordFields> for PendingRecord {
    fn from(f: RecordFields) -> Self {
        PendingRecord::new(f.account, f.repo_id, f.repo_name, f.parent_dir, f.local_path)
    }
}

impl PendingRecord {
    /// Creates a new record.
    ///
    /// ## Arguments
    /// * `account` - Account owning the repository
    /// * `repo_id` - Repository identifier
    /// * `repo_name` - Repository display name
    /// * `parent_dir` - Directory inside the repository holding the file
    /// * `local_path` - Absolute local path of the modified file
    pub fn new(
        account: impl Into<AccountIdentity>,
        repo_id: impl Into<String>,
        repo_name: impl Into<String>,
        parent_dir: impl Into<String>,
        local_path: impl Into<String>,
    ) -> Self {
        let account = account.into();
        let repo_id = repo_id.into();
        let repo_name = repo_name.into();
        let parent_dir = parent_dir.into();
        let local_path = local_path.into();

        let mut hasher = DefaultHasher::new();
        account.hash(&mut hasher);
        repo_id.hash(&mut hasher);
        repo_name.hash(&mut hasher);
        parent_dir.hash(&mut hasher);
        local_path.hash(&mut hasher);

        PendingRecord {
            account,
            repo_id,
            repo_name,
            parent_dir,
            local_path,
            hash: hasher.finish(),
        }
    }

    /// Account owning this job.
    pub fn account(&self) -> &AccountIdentity {
        &self.account
    }

    /// Repository identifier.
    pub fn repo_id(&self) -> &str {
        &self.repo_id
    }

    /// Repository display name.
    pub fn repo_name(&self) -> &str {
        &self.repo_name
    }

    /// Directory within the repository that holds the target file.
    pub fn parent_dir(&self) -> &str {
        &self.parent_dir
    }

    /// Absolute local path of the modified file.
    pub fn local_path(&self) -> &str {
        &self.local_path
    }

    /// Returns true if this record is the one a completion notification refers to.
    pub fn matches(
        &self,
        account: &AccountIdentity,
        repo_id: &str,
        parent_dir: &str,
        local_path: &str,
    ) -> bool {
        self.account == *account
            && self.repo_id == repo_id
            && self.parent_dir == parent_dir
            && self.local_path == local_path
    }

    /// Builds the payload handed to the transfer service.
    pub fn to_upload_request(&self) -> UploadRequest {
        UploadRequest {
            account: self.account.clone(),
            repo_id: self.repo_id.clone(),
            repo_name: self.repo_name.clone(),
            parent_dir: self.parent_dir.clone(),
            local_path: self.local_path.clone(),
            is_auto_update: true,
        }
    }

    /// Checks that the identifying fields are present.
    ///
    /// `repo_name` may be empty (display only); `parent_dir` is always at
    /// least `/` when derived through [`crate::parent_path`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.account.is_empty() {
            return Err(ValidationError::required("account"));
        }
        if self.repo_id.trim().is_empty() {
            return Err(ValidationError::required("repo_id"));
        }
        if self.parent_dir.is_empty() {
            return Err(ValidationError::required("parent_dir"));
        }
        if self.local_path.trim().is_empty() {
            return Err(ValidationError::required("local_path"));
        }
        if self.local_path.contains('\0') {
            return Err(ValidationError::Malformed {
                field: "local_path",
                reason: "contains NUL byte",
            });
        }
        Ok(())
    }
}

impl PartialEq for PendingRecord {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
            && self.account == other.account
            && self.repo_id == other.repo_id
            && self.repo_name == other.repo_name
            && self.parent_dir == other.parent_dir
            && self.local_path == other.local_path
    }
}

impl Eq for PendingRecord {}

impl Hash for PendingRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Debug for PendingRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRecord")
            .field("account", &self.account)
            .field("repo_id", &self.repo_id)
            .field("repo_name", &self.repo_name)
            .field("parent_dir", &self.parent_dir)
            .field("local_path", &self.local_path)
            .finish()
    }
}

// =============================================================================
// Upload Request
// =============================================================================

/// Fire-and-forget submission handed to the transfer service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRequest {
    /// Account owning the repository.
    pub account: AccountIdentity,

    /// Repository identifier.
    pub repo_id: String,

    /// Repository display name.
    pub repo_name: String,

    /// Target directory inside the repository.
    pub parent_dir: String,

    /// Local file to upload.
    pub local_path: String,

    /// Always true for jobs coming from the scheduler; lets the transfer
    /// service overwrite the remote file instead of creating a copy.
    pub is_auto_update: bool,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn sample() -> PendingRecord {
        PendingRecord::new(
            "alice@cloud.example.com",
            "repo1",
            "Repo One",
            "/docs",
            "/sdcard/docs/a.txt",
        )
    }

    #[test]
    fn test_distinct_but_equal_values_are_equal() {
        // Built from separately allocated strings
        let a = sample();
        let b = PendingRecord::new(
            AccountIdentity::new(String::from("alice@cloud.example.com")),
            String::from("repo1"),
            String::from("Repo One"),
            String::from("/docs"),
            String::from("/sdcard/docs/a.txt"),
        );

        assert_eq!(a, b);

        let mut set = HashSet::new();
        assert!(set.insert(a));
        assert!(!set.insert(b));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_every_field_participates_in_equality() {
        let base = sample();
        let variants = [
            PendingRecord::new("bob", "repo1", "Repo One", "/docs", "/sdcard/docs/a.txt"),
            PendingRecord::new("alice@cloud.example.com", "repo2", "Repo One", "/docs", "/sdcard/docs/a.txt"),
            PendingRecord::new("alice@cloud.example.com", "repo1", "Renamed", "/docs", "/sdcard/docs/a.txt"),
            PendingRecord::new("alice@cloud.example.com", "repo1", "Repo One", "/", "/sdcard/docs/a.txt"),
            PendingRecord::new("alice@cloud.example.com", "repo1", "Repo One", "/docs", "/sdcard/docs/b.txt"),
        ];

        for variant in &variants {
            assert_ne!(&base, variant);
        }
    }

    #[test]
    fn test_matches_ignores_repo_name() {
        let record = sample();
        let account = AccountIdentity::new("alice@cloud.example.com");

        assert!(record.matches(&account, "repo1", "/docs", "/sdcard/docs/a.txt"));
        assert!(!record.matches(&account, "repo1", "/docs", "/sdcard/docs/other.txt"));
        assert!(!record.matches(&AccountIdentity::new("bob"), "repo1", "/docs", "/sdcard/docs/a.txt"));
    }

    #[test]
    fn test_upload_request_is_auto_update() {
        let request = sample().to_upload_request();
        assert!(request.is_auto_update);
        assert_eq!(request.repo_name, "Repo One");
        assert_eq!(request.local_path, "/sdcard/docs/a.txt");
    }

    #[test]
    fn test_validate() {
        assert!(sample().validate().is_ok());

        let missing_repo = PendingRecord::new("alice", "", "Repo", "/", "/tmp/a");
        assert_eq!(
            missing_repo.validate(),
            Err(ValidationError::required("repo_id"))
        );

        let missing_account = PendingRecord::new("", "repo1", "Repo", "/", "/tmp/a");
        assert!(missing_account.validate().is_err());

        let blank_path = PendingRecord::new("alice", "repo1", "Repo", "/", "   ");
        assert!(blank_path.validate().is_err());
    }

    #[test]
    fn test_serde_rebuilds_hash() {
        let record = sample();
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("hash"));

        let back: PendingRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);

        let mut set = HashSet::new();
        set.insert(record);
        assert!(set.contains(&back));
    }
}

//! Database layer (Firestore).

pub mod firestore;

pub use firestore::{CredentialListener, FirestoreDb};

/// Collection names as constants.
pub mod collections {
    /// Per-user Netatmo credentials (keyed by identity-provider uid)
    pub const USERS: &str = "users";
}

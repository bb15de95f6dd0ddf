use std::sync::{PoisonError, RwLock};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use uuid::Uuid;

use super::LocalDb;
use crate::common::types::now_millis;
use crate::common::{AuthError, UserProfile};
use crate::gateway::SessionProvider;
use crate::storage::models::Account;

/// Accounts kept in the local database; the session lives for the process.
pub struct LocalSession {
    db: LocalDb,
    current: RwLock<Option<UserProfile>>,
}

impl LocalSession {
    pub(crate) fn new(db: LocalDb) -> Self {
        Self {
            db,
            current: RwLock::new(None),
        }
    }

    fn set_current(&self, profile: Option<UserProfile>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = profile;
    }
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthError::Failed(format!("password hashing failed: {err}")))
}

fn verify_password(password: &str, stored: &str) -> Result<(), AuthError> {
    let parsed = PasswordHash::new(stored)
        .map_err(|err| AuthError::Failed(format!("stored hash unreadable: {err}")))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AuthError::Failed("password mismatch".into()))
}

#[async_trait]
impl SessionProvider for LocalSession {
    fn current_user(&self) -> Option<UserProfile> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<UserProfile, AuthError> {
        let account = self
            .db
            .lock()
            .find_account(email.trim())?
            .ok_or_else(|| AuthError::Failed(format!("no account for {email}")))?;

        verify_password(password, &account.password_hash)?;

        let profile = UserProfile {
            id: account.id,
            display_name: account.display_name,
        };
        self.set_current(Some(profile.clone()));
        Ok(profile)
    }

    async fn sign_up(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<UserProfile, AuthError> {
        if username.trim().is_empty() || email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::Failed("username, email and password are required".into()));
        }

        let account = Account {
            id: Uuid::new_v4().simple().to_string(),
            email: email.trim().to_string(),
            display_name: username.trim().to_string(),
            password_hash: hash_password(password)?,
            created_at: now_millis(),
        };
        self.db.lock().insert_account(&account)?;

        let profile = UserProfile {
            id: account.id,
            display_name: account.display_name,
        };
        self.set_current(Some(profile.clone()));
        Ok(profile)
    }

    fn sign_out(&self) {
        self.set_current(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ChatDatabase;

    fn session() -> LocalSession {
        LocalSession::new(LocalDb::new(ChatDatabase::in_memory().unwrap()))
    }

    #[tokio::test]
    async fn sign_up_then_sign_in() {
        let session = session();
        assert!(session.current_user().is_none());

        let created = session.sign_up("Alice", "alice@example.com", "pw").await.unwrap();
        assert_eq!(created.display_name, "Alice");
        assert_eq!(session.current_user(), Some(created.clone()));

        session.sign_out();
        assert!(session.current_user().is_none());

        let signed_in = session.sign_in("alice@example.com", "pw").await.unwrap();
        assert_eq!(signed_in, created);
    }

    #[tokio::test]
    async fn failures_are_undifferentiated() {
        let session = session();
        session.sign_up("Alice", "alice@example.com", "pw").await.unwrap();
        session.sign_out();

        let wrong_password = session.sign_in("alice@example.com", "nope").await;
        let unknown = session.sign_in("bob@example.com", "pw").await;
        let duplicate = session.sign_up("Alice2", "alice@example.com", "pw").await;

        for result in [wrong_password, unknown, duplicate] {
            assert!(matches!(result, Err(AuthError::Failed(_))));
        }
        assert!(session.current_user().is_none());
    }

    #[tokio::test]
    async fn stored_password_is_a_salted_argon2_hash() {
        let db = LocalDb::new(ChatDatabase::in_memory().unwrap());
        let session = LocalSession::new(db.clone());
        session.sign_up("Alice", "alice@example.com", "pw").await.unwrap();
        session.sign_up("Bob", "bob@example.com", "pw").await.unwrap();

        let alice = db.lock().find_account("alice@example.com").unwrap().unwrap();
        let bob = db.lock().find_account("bob@example.com").unwrap().unwrap();
        assert!(alice.password_hash.starts_with("$argon2"));
        // Same password, different salts.
        assert_ne!(alice.password_hash, bob.password_hash);
        assert!(verify_password("pw", &alice.password_hash).is_ok());
        assert!(verify_password("other", &alice.password_hash).is_err());
    }

    #[test]
    fn corrupt_stored_hash_fails_sign_in() {
        assert!(matches!(
            verify_password("pw", "not-a-phc-string"),
            Err(AuthError::Failed(_))
        ));
    }
}

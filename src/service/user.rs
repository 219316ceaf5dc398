use crate::error::app_error::AppError;
use crate::models::user::{RegisterRequest, User, UserUpdateRequest};
use crate::rpc::RpcClient;
use crate::service::oauth::OAuthProfile;
use crate::store::FilterExpr;
use crate::store::engine::RecordMap;
use argon2::Argon2;
use chrono::Utc;
use password_hash::rand_core::OsRng;
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, Salt, SaltString};
use serde_json::json;
use std::sync::LazyLock;
use uuid::Uuid;

const TABLE: &str = "users";

/// A real Argon2 hash generated once at startup, used as a timing decoy
/// so that login requests for non-existent users take the same time as
/// requests for existing users.
static DUMMY_HASH: LazyLock<String> = LazyLock::new(|| {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(b"dummy-never-matches", Salt::from(&salt))
        .expect("failed to generate dummy hash")
        .to_string()
});

/// User accounts, persisted through the record service.
#[derive(Clone)]
pub struct UserService {
    rpc: RpcClient,
}

impl UserService {
    pub fn new(rpc: RpcClient) -> Self {
        Self { rpc }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        match self.rpc.get_map(TABLE, id).await? {
            Some(record) => Ok(Some(User::from_record(&record)?)),
            None => Ok(None),
        }
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.find_one(&FilterExpr::eq("email", email)).await
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        self.find_one(&FilterExpr::eq("username", username)).await
    }

    pub async fn get_by_oauth(&self, provider: &str, oauth_id: &str) -> Result<Option<User>, AppError> {
        let filter = FilterExpr::eq("oauth_provider", provider).and("oauth_id", crate::store::FilterOp::Eq, oauth_id);
        self.find_one(&filter).await
    }

    async fn find_one(&self, filter: &FilterExpr) -> Result<Option<User>, AppError> {
        match self.rpc.find_one(TABLE, filter).await? {
            Some(record) => Ok(Some(User::from_record(&record)?)),
            None => Ok(None),
        }
    }

    pub async fn list(&self, page: i64, page_size: i64) -> Result<(Vec<User>, i64), AppError> {
        let (records, total) = self.rpc.list_maps(TABLE, page, page_size, &FilterExpr::new()).await?;
        let users = records.iter().map(User::from_record).collect::<Result<Vec<_>, _>>()?;
        Ok((users, total))
    }

    pub async fn create(&self, request: &RegisterRequest) -> Result<User, AppError> {
        let mut fields = RecordMap::new();
        fields.insert("email".to_string(), json!(request.email));
        fields.insert("username".to_string(), json!(request.username));
        if let Some(full_name) = &request.full_name {
            fields.insert("full_name".to_string(), json!(full_name));
        }
        fields.insert("hashed_password".to_string(), json!(hash_password(&request.password)?));
        fields.insert("is_active".to_string(), json!(true));
        fields.insert("is_superuser".to_string(), json!(false));
        fields.insert("created_at".to_string(), json!(Utc::now().to_rfc3339()));

        let id = self.rpc.create(TABLE, &fields).await?;
        self.require(id).await
    }

    /// Creates an account from a provider profile. No local password; the
    /// account authenticates through the provider until one is set.
    pub async fn create_from_oauth(&self, profile: &OAuthProfile, username: &str) -> Result<User, AppError> {
        let mut fields = RecordMap::new();
        fields.insert("email".to_string(), json!(profile.email));
        fields.insert("username".to_string(), json!(username));
        if let Some(full_name) = &profile.full_name {
            fields.insert("full_name".to_string(), json!(full_name));
        }
        fields.insert("is_active".to_string(), json!(true));
        fields.insert("is_superuser".to_string(), json!(false));
        fields.insert("oauth_provider".to_string(), json!(profile.provider));
        fields.insert("oauth_id".to_string(), json!(profile.subject_id));
        fields.insert("created_at".to_string(), json!(Utc::now().to_rfc3339()));

        let id = self.rpc.create(TABLE, &fields).await?;
        self.require(id).await
    }

    /// Links an existing password account to a provider identity.
    pub async fn link_oauth(&self, id: Uuid, profile: &OAuthProfile) -> Result<User, AppError> {
        let mut fields = RecordMap::new();
        fields.insert("oauth_provider".to_string(), json!(profile.provider));
        fields.insert("oauth_id".to_string(), json!(profile.subject_id));
        self.apply_update(id, fields).await
    }

    pub async fn update(&self, id: Uuid, request: &UserUpdateRequest) -> Result<User, AppError> {
        if request.is_empty() {
            return Err(AppError::BadRequest("No fields to update".to_string()));
        }
        let mut fields = RecordMap::new();
        if let Some(email) = &request.email {
            if let Some(existing) = self.get_by_email(email).await? {
                if existing.id != id {
                    return Err(AppError::UserAlreadyExists(email.clone()));
                }
            }
            fields.insert("email".to_string(), json!(email));
        }
        if let Some(full_name) = &request.full_name {
            fields.insert("full_name".to_string(), json!(full_name));
        }
        if let Some(password) = &request.password {
            fields.insert("hashed_password".to_string(), json!(hash_password(password)?));
        }
        self.apply_update(id, fields).await
    }

    async fn apply_update(&self, id: Uuid, mut fields: RecordMap) -> Result<User, AppError> {
        fields.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));
        if !self.rpc.update(TABLE, id, &fields).await? {
            return Err(AppError::UserNotFound);
        }
        self.require(id).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        if !self.rpc.delete(TABLE, id).await? {
            return Err(AppError::UserNotFound);
        }
        Ok(())
    }

    pub async fn touch_last_login(&self, id: Uuid) -> Result<(), AppError> {
        let mut fields = RecordMap::new();
        fields.insert("last_login".to_string(), json!(Utc::now().to_rfc3339()));
        self.rpc.update(TABLE, id, &fields).await?;
        Ok(())
    }

    /// Verifies credentials. Lookup misses and password mismatches take
    /// the same code path length: a throwaway Argon2 verification runs
    /// whenever there is no stored hash to check against.
    pub async fn authenticate(&self, identifier: &str, password: &str) -> Result<User, AppError> {
        let user = if identifier.contains('@') {
            self.get_by_email(identifier).await?
        } else {
            self.get_by_username(identifier).await?
        };

        let Some(user) = user else {
            dummy_verify(password);
            return Err(AppError::InvalidCredentials);
        };
        let Some(hash) = &user.hashed_password else {
            // Provider-only account with no local password.
            dummy_verify(password);
            return Err(AppError::InvalidCredentials);
        };

        verify_password(hash, password)?;
        if !user.is_active {
            return Err(AppError::Forbidden);
        }
        Ok(user)
    }

    async fn require(&self, id: Uuid) -> Result<User, AppError> {
        self.get_by_id(id).await?.ok_or(AppError::UserNotFound)
    }
}

pub(crate) fn hash_password(password: &str) -> Result<String, AppError> {
    let salt_string = SaltString::generate(&mut OsRng);
    let salt = Salt::from(&salt_string);
    let hash = PasswordHash::generate(Argon2::default(), password.as_bytes(), salt)
        .map_err(|e| AppError::password_hash("Failed to hash password", e))?;
    Ok(hash.to_string())
}

pub(crate) fn verify_password(stored: &str, password: &str) -> Result<(), AppError> {
    let hash = PasswordHash::new(stored).map_err(|e| AppError::password_hash("Failed to parse stored password hash", e))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &hash)
        .map_err(|_| AppError::InvalidCredentials)
}

/// Perform a throwaway Argon2 verification to equalize response timing
/// regardless of whether the target account exists.
pub(crate) fn dummy_verify(password: &str) {
    if let Ok(hash) = PasswordHash::new(&DUMMY_HASH) {
        let _ = Argon2::default().verify_password(password.as_bytes(), &hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_round_trip() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(verify_password(&hash, "correct horse battery staple").is_ok());
        assert!(matches!(
            verify_password(&hash, "wrong password"),
            Err(AppError::InvalidCredentials)
        ));
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("same input").unwrap();
        let b = hash_password("same input").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn dummy_verify_does_not_panic() {
        dummy_verify("anything at all");
    }

    mod with_harness {
        use crate::error::app_error::AppError;
        use crate::models::user::UserUpdateRequest;
        use crate::test_utils::{harness, register_request};
        use uuid::Uuid;

        #[rocket::async_test]
        async fn update_rejects_taken_email() {
            let h = harness();
            h.users.create(&register_request("a@example.dev", "user_a")).await.unwrap();
            let b = h.users.create(&register_request("b@example.dev", "user_b")).await.unwrap();

            let request = UserUpdateRequest {
                email: Some("a@example.dev".to_string()),
                full_name: None,
                password: None,
            };
            let result = h.users.update(b.id, &request).await;
            assert!(matches!(result, Err(AppError::UserAlreadyExists(_))));
        }

        #[rocket::async_test]
        async fn update_with_no_fields_is_a_bad_request() {
            let h = harness();
            let user = h.users.create(&register_request("a@example.dev", "user_a")).await.unwrap();
            let request = UserUpdateRequest {
                email: None,
                full_name: None,
                password: None,
            };
            assert!(matches!(h.users.update(user.id, &request).await, Err(AppError::BadRequest(_))));
        }

        #[rocket::async_test]
        async fn update_stamps_updated_at_and_rehashes_password() {
            let h = harness();
            let user = h.users.create(&register_request("a@example.dev", "user_a")).await.unwrap();
            let old_hash = user.hashed_password.clone().unwrap();

            let request = UserUpdateRequest {
                email: None,
                full_name: Some("Ada L.".to_string()),
                password: Some("another long password".to_string()),
            };
            let updated = h.users.update(user.id, &request).await.unwrap();
            assert_eq!(updated.full_name.as_deref(), Some("Ada L."));
            assert!(updated.updated_at.is_some());
            assert_ne!(updated.hashed_password.unwrap(), old_hash);

            assert!(h.users.authenticate("user_a", "another long password").await.is_ok());
        }

        #[rocket::async_test]
        async fn delete_of_unknown_user_fails() {
            let h = harness();
            assert!(matches!(h.users.delete(Uuid::new_v4()).await, Err(AppError::UserNotFound)));
        }

        #[rocket::async_test]
        async fn list_paginates() {
            let h = harness();
            for i in 0..5 {
                h.users
                    .create(&register_request(&format!("u{}@example.dev", i), &format!("user_{}", i)))
                    .await
                    .unwrap();
            }
            let (page_one, total) = h.users.list(1, 2).await.unwrap();
            assert_eq!(total, 5);
            assert_eq!(page_one.len(), 2);
            let (page_three, _) = h.users.list(3, 2).await.unwrap();
            assert_eq!(page_three.len(), 1);
        }

        #[rocket::async_test]
        async fn list_with_absurd_page_is_an_empty_page() {
            let h = harness();
            h.users
                .create(&register_request("solo@example.dev", "solo_user"))
                .await
                .unwrap();
            let (records, total) = h.users.list(i64::MAX, 100).await.unwrap();
            assert_eq!(total, 1);
            assert!(records.is_empty());
        }
    }
}

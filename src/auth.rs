//! Bearer-key authentication for the REST surface, plus the per-user API key
//! lifecycle (lazy creation, immediate-invalidation regeneration).

use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::models::UserId;
use rand::distr::Alphanumeric;
use rand::Rng;
use std::sync::Arc;

const KEY_PREFIX: &str = "tk_";
const KEY_SUFFIX_LEN: usize = 32;
const MIN_KEY_LEN: usize = 10;

fn generate_api_key() -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(KEY_SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!("{KEY_PREFIX}{suffix}")
}

pub struct AuthService {
    db: Arc<Database>,
}

impl AuthService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Resolves a raw `Authorization` header value to an owner identity.
    /// Every failure is a 401-class `Auth` error; the length check runs
    /// before the store lookup as a cheap pre-filter.
    pub fn authenticate(&self, header: Option<&str>) -> AppResult<UserId> {
        let header = header.ok_or_else(missing_header)?;
        let key = header.strip_prefix("Bearer ").ok_or_else(missing_header)?;

        if key.len() < MIN_KEY_LEN {
            return Err(AppError::Auth("Invalid API key format".to_string()));
        }

        match self.db.api_key_by_key(key)? {
            Some(record) => Ok(record.user_id),
            None => Err(AppError::Auth("Invalid API key".to_string())),
        }
    }

    /// The user's current key, if one was ever created.
    pub fn get(&self, user: &UserId) -> AppResult<Option<String>> {
        Ok(self.db.api_key_by_user(user)?.map(|record| record.key))
    }

    /// Lazily creates the user's single key on first request.
    pub fn get_or_create(&self, user: &UserId) -> AppResult<String> {
        if let Some(existing) = self.db.api_key_by_user(user)? {
            return Ok(existing.key);
        }
        let record = self.db.insert_api_key(user, &generate_api_key())?;
        tracing::info!(user = %user, "api key created");
        Ok(record.key)
    }

    /// Replaces the key. The old one is deleted first, so it stops working
    /// the moment this returns; exactly one key stays live per user.
    pub fn regenerate(&self, user: &UserId) -> AppResult<String> {
        self.db.delete_api_keys_for_user(user)?;
        let record = self.db.insert_api_key(user, &generate_api_key())?;
        tracing::info!(user = %user, "api key regenerated");
        Ok(record.key)
    }
}

fn missing_header() -> AppError {
    AppError::Auth(
        "Missing or invalid Authorization header. Use: Bearer <your-api-key>".to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AuthService {
        AuthService::new(Arc::new(Database::in_memory().expect("db")))
    }

    fn user() -> UserId {
        UserId("u-1".to_string())
    }

    #[test]
    fn generated_keys_have_the_expected_shape() {
        let key = generate_api_key();
        assert!(key.starts_with(KEY_PREFIX));
        assert_eq!(key.len(), KEY_PREFIX.len() + KEY_SUFFIX_LEN);
        assert!(key[KEY_PREFIX.len()..].chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn missing_or_malformed_header_is_rejected() {
        let service = service();
        assert!(matches!(service.authenticate(None), Err(AppError::Auth(_))));
        assert!(matches!(
            service.authenticate(Some("Basic abc")),
            Err(AppError::Auth(_))
        ));
        assert!(matches!(
            service.authenticate(Some("tk_rawkeywithoutscheme")),
            Err(AppError::Auth(_))
        ));
    }

    #[test]
    fn short_tokens_fail_before_the_store_lookup() {
        let service = service();
        let error = service.authenticate(Some("Bearer short")).unwrap_err();
        assert!(error.to_string().contains("Invalid API key format"));
    }

    #[test]
    fn unknown_keys_are_rejected_and_known_keys_resolve() {
        let service = service();
        let key = service.get_or_create(&user()).expect("create key");

        assert!(matches!(
            service.authenticate(Some("Bearer tk_definitely_not_issued")),
            Err(AppError::Auth(_))
        ));

        let resolved = service
            .authenticate(Some(&format!("Bearer {key}")))
            .expect("authenticate");
        assert_eq!(resolved, user());
    }

    #[test]
    fn get_or_create_is_lazy_and_stable() {
        let service = service();
        assert!(service.get(&user()).expect("get").is_none());

        let first = service.get_or_create(&user()).expect("create");
        let second = service.get_or_create(&user()).expect("reuse");
        assert_eq!(first, second);
        assert_eq!(service.get(&user()).expect("get").as_deref(), Some(first.as_str()));
    }

    #[test]
    fn regenerate_invalidates_the_old_key_immediately() {
        let service = service();
        let old = service.get_or_create(&user()).expect("create");
        let new = service.regenerate(&user()).expect("regenerate");
        assert_ne!(old, new);

        assert!(matches!(
            service.authenticate(Some(&format!("Bearer {old}"))),
            Err(AppError::Auth(_))
        ));
        assert_eq!(
            service.authenticate(Some(&format!("Bearer {new}"))).expect("auth"),
            user()
        );
    }
}

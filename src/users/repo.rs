use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::auth::password::hash_password;
use crate::auth::token::TokenCodec;
use crate::error::ApiError;
use crate::store::{bounded, KvStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    M,
    F,
}

impl Gender {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "M" => Some(Gender::M),
            "F" => Some(Gender::F),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::M => "M",
            Gender::F => "F",
        }
    }
}

/// Registered principal, keyed by email. The stored digest never leaves
/// the server: it is skipped on serialization.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    #[serde(rename = "entityId")]
    pub entity_id: String,
    pub email: String,
    pub name: String,
    /// unix-millisecond timestamp
    pub birthday: i64,
    pub gender: Gender,
    #[serde(skip_serializing)]
    pub password_hash: String,
}

/// Registration input; `password` is still plaintext here.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub birthday: i64,
    pub gender: Gender,
    pub password: String,
}

fn user_key(email: &str) -> String {
    format!("user:{email}")
}

impl User {
    fn from_fields(key: &str, fields: HashMap<String, String>) -> Result<Self, StoreError> {
        let corrupt = || StoreError::Corrupt(key.to_string());
        let take = |name: &str| fields.get(name).cloned().ok_or_else(corrupt);
        Ok(Self {
            entity_id: take("entityId")?,
            email: take("email")?,
            name: take("name")?,
            birthday: take("birthday")?.parse().map_err(|_| corrupt())?,
            gender: Gender::parse(&take("gender")?).ok_or_else(corrupt)?,
            password_hash: take("password")?,
        })
    }
}

/// Repository for `user:<email>` records. Uniqueness is not enforced
/// here; registration checks existence before calling [`create`].
///
/// [`create`]: UserStore::create
#[derive(Clone)]
pub struct UserStore {
    store: Arc<dyn KvStore>,
    codec: TokenCodec,
    op_timeout: Duration,
}

impl UserStore {
    pub fn new(store: Arc<dyn KvStore>, codec: TokenCodec, op_timeout: Duration) -> Self {
        Self { store, codec, op_timeout }
    }

    pub async fn get(&self, email: &str) -> Result<Option<User>, ApiError> {
        let key = user_key(email);
        let fields = bounded(self.op_timeout, self.store.hash_get_all(&key)).await?;
        match fields {
            Some(fields) => Ok(Some(User::from_fields(&key, fields)?)),
            None => Ok(None),
        }
    }

    /// Persists the full record, hashing the password and deriving the
    /// entityId on the way in.
    pub async fn create(&self, user: &NewUser) -> Result<(), ApiError> {
        let digest = hash_password(&user.password).map_err(|e| {
            error!(error = %e, "hash_password failed");
            ApiError::Internal(e.to_string())
        })?;
        let fields = vec![
            ("entityId".into(), self.codec.entity_id(&user.email)),
            ("email".into(), user.email.clone()),
            ("name".into(), user.name.clone()),
            ("birthday".into(), user.birthday.to_string()),
            ("gender".into(), user.gender.as_str().into()),
            ("password".into(), digest),
        ];
        bounded(self.op_timeout, self.store.hash_set(&user_key(&user.email), &fields)).await?;
        Ok(())
    }

    /// Persists name and birthday only. Email and gender are immutable
    /// through this path.
    pub async fn update_profile(
        &self,
        email: &str,
        name: &str,
        birthday: i64,
    ) -> Result<(), ApiError> {
        let fields = vec![
            ("name".into(), name.to_string()),
            ("birthday".into(), birthday.to_string()),
        ];
        bounded(self.op_timeout, self.store.hash_set(&user_key(email), &fields)).await?;
        Ok(())
    }

    /// Recomputes the digest and overwrites only the password field.
    pub async fn update_password(&self, email: &str, new_password: &str) -> Result<(), ApiError> {
        let digest = hash_password(new_password).map_err(|e| {
            error!(error = %e, "hash_password failed");
            ApiError::Internal(e.to_string())
        })?;
        let fields = vec![("password".into(), digest)];
        bounded(self.op_timeout, self.store.hash_set(&user_key(email), &fields)).await?;
        Ok(())
    }
}

use bcrypt::hash;
use chrono::Utc;
use mongodb::bson::{self, doc};
use rand::{distr::Alphanumeric, Rng};
use serde::Serialize;
use std::sync::Arc;

use crate::metrics::ACCOUNT_OPERATIONS_TOTAL;
use crate::models::account::{
    Account, AccountCreatedResponse, CreateFamilyAccountRequest, CreateStaffAccountRequest,
    PasswordResetResponse, ACCOUNTS_COLLECTION, ACCOUNT_EMAIL_FIELD,
};
use crate::models::recipient::{Child, RecipientRole};
use crate::services::document_store::{encode, DocumentStore, StoreError};
use crate::services::recipient_directory::RecipientDirectory;

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("Staff role required")]
    Forbidden,

    #[error("Account not found: {0}")]
    NotFound(String),

    #[error("Account with email {0} already exists")]
    Conflict(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Failed to hash password: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Recipient record written alongside a new account
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewRecipientRecord {
    #[serde(rename = "_id")]
    id: String,
    uid: String,
    email: String,
    display_name: String,
    fcm_tokens: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    children: Option<Vec<Child>>,
}

fn generate_temp_password() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect()
}

/// Parent and staff account lifecycle. Every operation requires the caller to
/// have a record in the staff store.
pub struct AccountService {
    store: Arc<dyn DocumentStore>,
    directory: RecipientDirectory,
    hash_cost: u32,
}

impl AccountService {
    pub fn new(store: Arc<dyn DocumentStore>, hash_cost: u32) -> Self {
        Self {
            directory: RecipientDirectory::new(store.clone()),
            store,
            hash_cost,
        }
    }

    /// The staff store is authoritative; token claims alone are not trusted.
    pub async fn ensure_staff(&self, caller_uid: &str) -> Result<(), AccountError> {
        match self.directory.resolve(caller_uid).await? {
            Some(recipient) if recipient.role == RecipientRole::Staff => Ok(()),
            _ => {
                tracing::warn!("Access denied for {}: staff role required", caller_uid);
                Err(AccountError::Forbidden)
            }
        }
    }

    pub async fn create_family_account(
        &self,
        caller_uid: &str,
        req: CreateFamilyAccountRequest,
    ) -> Result<AccountCreatedResponse, AccountError> {
        self.ensure_staff(caller_uid).await?;

        let children = req
            .children
            .into_iter()
            .map(|child| child.into_child(uuid::Uuid::new_v4().to_string()))
            .collect();

        let result = self
            .create_account(
                RecipientRole::Family,
                req.email,
                req.password,
                req.display_name,
                Some(children),
            )
            .await;
        record_operation("create_family", &result);
        result
    }

    pub async fn create_staff_account(
        &self,
        caller_uid: &str,
        req: CreateStaffAccountRequest,
    ) -> Result<AccountCreatedResponse, AccountError> {
        self.ensure_staff(caller_uid).await?;

        let result = self
            .create_account(
                RecipientRole::Staff,
                req.email,
                req.password,
                req.display_name,
                None,
            )
            .await;
        record_operation("create_staff", &result);
        result
    }

    /// Replaces the password with a generated one and returns it once.
    pub async fn reset_password(
        &self,
        caller_uid: &str,
        uid: &str,
    ) -> Result<PasswordResetResponse, AccountError> {
        self.ensure_staff(caller_uid).await?;

        let result = self.replace_password(caller_uid, uid).await;
        record_operation("reset_password", &result);
        result
    }

    /// Deletes the login identity and the staff/family record, so later
    /// triggers no longer reach this user.
    pub async fn delete_account(&self, caller_uid: &str, uid: &str) -> Result<(), AccountError> {
        self.ensure_staff(caller_uid).await?;

        let result = self.remove_account(caller_uid, uid).await;
        record_operation("delete", &result);
        result
    }

    async fn replace_password(
        &self,
        caller_uid: &str,
        uid: &str,
    ) -> Result<PasswordResetResponse, AccountError> {
        let temporary_password = generate_temp_password();
        let password_hash = hash(&temporary_password, self.hash_cost)?;

        let matched = self
            .store
            .update_by_id(
                ACCOUNTS_COLLECTION,
                uid,
                doc! {
                    "passwordHash": password_hash,
                    "updatedAt": bson::DateTime::now(),
                },
            )
            .await?;

        if !matched {
            return Err(AccountError::NotFound(uid.to_string()));
        }

        tracing::info!("Password reset for account {} by {}", uid, caller_uid);
        Ok(PasswordResetResponse {
            uid: uid.to_string(),
            temporary_password,
        })
    }

    async fn remove_account(&self, caller_uid: &str, uid: &str) -> Result<(), AccountError> {
        if caller_uid == uid {
            return Err(AccountError::Validation(
                "Staff cannot delete their own account".to_string(),
            ));
        }

        let mut deleted = self
            .store
            .delete_by_field(ACCOUNTS_COLLECTION, "uid", uid)
            .await?;
        for role in RecipientRole::LOOKUP_ORDER {
            deleted += self
                .store
                .delete_by_field(role.collection(), "uid", uid)
                .await?;
        }

        if deleted == 0 {
            return Err(AccountError::NotFound(uid.to_string()));
        }

        tracing::info!("Account {} deleted by {}", uid, caller_uid);
        Ok(())
    }

    async fn create_account(
        &self,
        role: RecipientRole,
        email: String,
        password: Option<String>,
        display_name: String,
        children: Option<Vec<Child>>,
    ) -> Result<AccountCreatedResponse, AccountError> {
        let existing = self
            .store
            .query_by_field(ACCOUNTS_COLLECTION, ACCOUNT_EMAIL_FIELD, &email, 1)
            .await?;
        if !existing.is_empty() {
            return Err(AccountError::Conflict(email));
        }

        let (password, temporary_password) = match password {
            Some(password) => (password, None),
            None => {
                let generated = generate_temp_password();
                (generated.clone(), Some(generated))
            }
        };
        let password_hash = hash(&password, self.hash_cost)?;

        let uid = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        let account = Account {
            id: uid.clone(),
            uid: uid.clone(),
            email: email.clone(),
            password_hash,
            role,
            display_name: display_name.clone(),
            created_at: now,
            updated_at: now,
        };
        // The pre-check above is racy; the unique email constraint decides.
        match self
            .store
            .insert(ACCOUNTS_COLLECTION, encode(ACCOUNTS_COLLECTION, &account)?)
            .await
        {
            Ok(()) => {}
            Err(StoreError::Duplicate { .. }) => return Err(AccountError::Conflict(email)),
            Err(e) => return Err(e.into()),
        }

        let record = NewRecipientRecord {
            id: uid.clone(),
            uid: uid.clone(),
            email: email.clone(),
            display_name,
            fcm_tokens: Vec::new(),
            children,
        };
        self.store
            .insert(role.collection(), encode(role.collection(), &record)?)
            .await?;

        tracing::info!("Created {} account {} ({})", role.as_str(), uid, email);

        Ok(AccountCreatedResponse {
            uid,
            email,
            role,
            temporary_password,
        })
    }
}

fn record_operation<T>(operation: &str, result: &Result<T, AccountError>) {
    let status = if result.is_ok() { "success" } else { "error" };
    ACCOUNT_OPERATIONS_TOTAL
        .with_label_values(&[operation, status])
        .inc();
}

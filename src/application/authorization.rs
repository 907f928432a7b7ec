use axum::http::StatusCode;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::domain::{entities::users::UserEntity, value_objects::enums::roles::Role};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("Unauthenticated.")]
    UnknownUser,
    #[error("Unauthorized action.")]
    Forbidden,
}

impl AccessError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AccessError::UnknownUser => StatusCode::UNAUTHORIZED,
            AccessError::Forbidden => StatusCode::FORBIDDEN,
        }
    }
}

/// Admin gate for plan mutation.
pub fn require_admin(user_id: Uuid, user: Option<UserEntity>) -> Result<UserEntity, AccessError> {
    require_role(user_id, user, Role::Admin)
}

/// Owner gate for the current-plan view.
pub fn require_owner(user_id: Uuid, user: Option<UserEntity>) -> Result<UserEntity, AccessError> {
    require_role(user_id, user, Role::Owner)
}

/// Any known user.
pub fn require_user(user_id: Uuid, user: Option<UserEntity>) -> Result<UserEntity, AccessError> {
    user.ok_or_else(|| {
        let err = AccessError::UnknownUser;
        warn!(%user_id, status = err.status_code().as_u16(), "authorization: unknown user");
        err
    })
}

fn require_role(
    user_id: Uuid,
    user: Option<UserEntity>,
    role: Role,
) -> Result<UserEntity, AccessError> {
    let user = require_user(user_id, user)?;

    if !user.has_role(role) {
        let err = AccessError::Forbidden;
        warn!(
            %user_id,
            required_role = %role,
            actual_role = %user.role,
            status = err.status_code().as_u16(),
            "authorization: role check failed"
        );
        return Err(err);
    }

    Ok(user)
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;
    use uuid::Uuid;

    use crate::domain::entities::users::UserEntity;

    pub fn user_with_role(role: &str) -> UserEntity {
        let now = Utc::now();
        UserEntity {
            id: Uuid::new_v4(),
            email: Some("owner@example.com".to_string()),
            role: role.to_string(),
            plan_id: None,
            plan_status: None,
            cancel_url: None,
            provider_customer_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

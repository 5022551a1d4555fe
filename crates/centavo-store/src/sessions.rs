use centavo_core::insight::UserProfile;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{Store, StoreError};

/// Outcome of looking up a bearer token.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCheck {
    Valid(UserProfile),
    NotFound,
    /// Revoked or past its expiry.
    Expired,
    /// The session exists but its user is gone or deactivated.
    NoUser,
}

#[derive(FromRow)]
struct SessionRow {
    expires_at: DateTime<Utc>,
    valid: bool,
    user_id: Option<Uuid>,
    name: Option<String>,
    active: Option<bool>,
    currency: Option<String>,
    language: Option<String>,
    monthly_limit: Option<f64>,
}

impl Store {
    pub async fn check_session(&self, token: &str) -> Result<SessionCheck, StoreError> {
        let row: Option<SessionRow> = sqlx::query_as(
            "SELECT s.expires_at, s.valid, u.id AS user_id, u.name, u.active,
                    c.currency, c.language, c.monthly_limit
             FROM sessions s
             LEFT JOIN users u ON u.id = s.user_id
             LEFT JOIN user_configs c ON c.user_id = u.id
             WHERE s.token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(SessionCheck::NotFound);
        };
        if !row.valid || row.expires_at < Utc::now() {
            return Ok(SessionCheck::Expired);
        }
        let (Some(user_id), Some(true)) = (row.user_id, row.active) else {
            return Ok(SessionCheck::NoUser);
        };

        Ok(SessionCheck::Valid(UserProfile::new(
            user_id,
            row.name.unwrap_or_default(),
            row.currency.as_deref(),
            row.language.as_deref(),
            row.monthly_limit,
        )))
    }
}

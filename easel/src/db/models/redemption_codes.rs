//! Database models for redemption codes.

use crate::types::{RedemptionCodeId, UserId};
use chrono::{DateTime, Utc};

/// Database request for creating a redemption code
#[derive(Debug, Clone)]
pub struct RedemptionCodeCreateDBRequest {
    pub code: String,
    pub points: i64,
    pub created_by: Option<UserId>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Database response for a redemption code
#[derive(Debug, Clone)]
pub struct RedemptionCodeDBResponse {
    pub id: RedemptionCodeId,
    pub code: String,
    pub points: i64,
    pub is_used: bool,
    pub used_by: Option<UserId>,
    pub used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl RedemptionCodeDBResponse {
    /// A code is redeemable when unused and not past its expiry.
    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        !self.is_used && self.expires_at.map_or(true, |exp| exp > now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn code(is_used: bool, expires_at: Option<DateTime<Utc>>) -> RedemptionCodeDBResponse {
        RedemptionCodeDBResponse {
            id: uuid::Uuid::new_v4(),
            code: "ABCD1234EFGH".to_string(),
            points: 10,
            is_used,
            used_by: None,
            used_at: None,
            expires_at,
            created_by: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn unused_code_without_expiry_is_redeemable() {
        assert!(code(false, None).is_redeemable(Utc::now()));
    }

    #[test]
    fn used_or_expired_codes_are_not_redeemable() {
        let now = Utc::now();
        assert!(!code(true, None).is_redeemable(now));
        assert!(!code(false, Some(now - Duration::hours(1))).is_redeemable(now));
        assert!(code(false, Some(now + Duration::hours(1))).is_redeemable(now));
    }
}

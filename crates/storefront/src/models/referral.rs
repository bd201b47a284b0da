//! Referral domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use emporium_core::{ReferralId, UserId};

/// A redeemable referral code.
#[derive(Debug, Clone, Serialize)]
pub struct Referral {
    pub id: ReferralId,
    /// Eight uppercase alphanumerics.
    pub code: String,
    pub owner_user_id: UserId,
    /// Percent off the referred user's first order.
    pub discount_percent: u8,
    pub usage_count: i32,
    /// Unlimited when `None`.
    pub max_uses: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Referral {
    /// Whether the code can be redeemed at `now`.
    #[must_use]
    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.expires_at.is_none_or(|expires| expires > now)
            && self.max_uses.is_none_or(|max| self.usage_count < max)
    }
}

/// Fields for inserting a new referral code.
#[derive(Debug, Clone)]
pub struct NewReferral {
    pub code: String,
    pub owner_user_id: UserId,
    pub discount_percent: u8,
    pub max_uses: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn referral() -> Referral {
        Referral {
            id: ReferralId::new(1),
            code: "ABCD2345".to_string(),
            owner_user_id: UserId::new(7),
            discount_percent: 10,
            usage_count: 0,
            max_uses: Some(2),
            expires_at: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_redeemable_until_limit() {
        let now = Utc::now();
        let mut r = referral();
        assert!(r.is_redeemable(now));
        r.usage_count = 2;
        assert!(!r.is_redeemable(now));
        r.max_uses = None;
        assert!(r.is_redeemable(now));
    }

    #[test]
    fn test_expired_or_inactive_not_redeemable() {
        let now = Utc::now();
        let mut r = referral();
        r.expires_at = Some(now - Duration::hours(1));
        assert!(!r.is_redeemable(now));

        let mut r = referral();
        r.is_active = false;
        assert!(!r.is_redeemable(now));
    }
}

//! Referral codes.
//!
//! Users create codes to share; a new account may redeem one code at
//! registration, which earns a percentage off its first order.

use chrono::{DateTime, Utc};
use rand::seq::IndexedRandom;
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use emporium_core::UserId;

use crate::db::referrals::RedemptionOutcome;
use crate::db::{ReferralRepository, RepositoryError};
use crate::models::{NewReferral, Referral};

/// Length of generated codes.
pub const CODE_LENGTH: usize = 8;

/// Discount applied when the creator does not choose one.
pub const DEFAULT_DISCOUNT_PERCENT: u8 = 10;

/// Highest discount a code may carry.
pub const MAX_DISCOUNT_PERCENT: u8 = 50;

/// Uppercase letters and digits without the easily confused `0 O 1 I`.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Attempts at finding an unused code before giving up.
const MAX_CODE_ATTEMPTS: usize = 5;

/// Errors from referral operations.
#[derive(Debug, Error)]
pub enum ReferralError {
    #[error("referral code not found")]
    NotFound,

    #[error("referral code is no longer valid")]
    NotRedeemable,

    #[error("you cannot redeem your own referral code")]
    SelfReferral,

    #[error("a referral code has already been redeemed for this account")]
    AlreadyRedeemed,

    #[error("{0}")]
    Invalid(String),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Options for a new code.
#[derive(Debug, Clone, Default)]
pub struct CodeOptions {
    pub discount_percent: Option<u8>,
    pub max_uses: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Referral operations.
pub struct ReferralService<'a> {
    referrals: ReferralRepository<'a>,
}

impl<'a> ReferralService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            referrals: ReferralRepository::new(pool),
        }
    }

    /// Create a code owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns `ReferralError::Invalid` for out-of-range options.
    #[instrument(skip(self))]
    pub async fn create_code(
        &self,
        owner: UserId,
        options: CodeOptions,
    ) -> Result<Referral, ReferralError> {
        let discount_percent = validate_options(&options, Utc::now())?;

        let mut last_err = None;
        for _ in 0..MAX_CODE_ATTEMPTS {
            let new = NewReferral {
                code: generate_code(),
                owner_user_id: owner,
                discount_percent,
                max_uses: options.max_uses,
                expires_at: options.expires_at,
            };

            match self.referrals.create(&new).await {
                Ok(referral) => return Ok(referral),
                Err(RepositoryError::Conflict(msg)) => {
                    tracing::debug!(code = %new.code, "Referral code collision, retrying");
                    last_err = Some(RepositoryError::Conflict(msg));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_err
            .unwrap_or_else(|| RepositoryError::Conflict("no free referral code".to_owned()))
            .into())
    }

    /// Look up a code and check it can still be redeemed.
    ///
    /// # Errors
    ///
    /// Returns `ReferralError::NotFound` for unknown codes and
    /// `ReferralError::NotRedeemable` for inactive, expired or exhausted ones.
    pub async fn validate(&self, code: &str) -> Result<Referral, ReferralError> {
        let code = normalize_code(code);
        let referral = self
            .referrals
            .get_by_code(&code)
            .await?
            .ok_or(ReferralError::NotFound)?;

        if !referral.is_redeemable(Utc::now()) {
            return Err(ReferralError::NotRedeemable);
        }

        Ok(referral)
    }

    /// Redeem a code for a newly registered user.
    ///
    /// # Errors
    ///
    /// Returns `ReferralError::SelfReferral` when the owner redeems their own
    /// code, `ReferralError::AlreadyRedeemed` on a second redemption, and the
    /// errors of [`Self::validate`].
    #[instrument(skip(self))]
    pub async fn redeem(&self, code: &str, user_id: UserId) -> Result<Referral, ReferralError> {
        let referral = self.validate(code).await?;

        if referral.owner_user_id == user_id {
            return Err(ReferralError::SelfReferral);
        }

        match self.referrals.record_redemption(referral.id, user_id).await? {
            RedemptionOutcome::Redeemed => {
                tracing::info!(referral_id = %referral.id, "Referral redeemed");
                Ok(referral)
            }
            RedemptionOutcome::AlreadyRedeemed => Err(ReferralError::AlreadyRedeemed),
            RedemptionOutcome::Exhausted => Err(ReferralError::NotRedeemable),
        }
    }

    /// Codes owned by `owner`, with usage counts.
    ///
    /// # Errors
    ///
    /// Returns `ReferralError::Repository` if the query fails.
    pub async fn list_mine(&self, owner: UserId) -> Result<Vec<Referral>, ReferralError> {
        Ok(self.referrals.list_for_owner(owner).await?)
    }
}

/// Random code of [`CODE_LENGTH`] characters from [`CODE_ALPHABET`].
fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .filter_map(|_| CODE_ALPHABET.choose(&mut rng).copied().map(char::from))
        .collect()
}

fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Check options and resolve the discount.
fn validate_options(options: &CodeOptions, now: DateTime<Utc>) -> Result<u8, ReferralError> {
    let discount = options.discount_percent.unwrap_or(DEFAULT_DISCOUNT_PERCENT);
    if !(1..=MAX_DISCOUNT_PERCENT).contains(&discount) {
        return Err(ReferralError::Invalid(format!(
            "discount_percent must be between 1 and {MAX_DISCOUNT_PERCENT}"
        )));
    }

    if options.max_uses.is_some_and(|max| max < 1) {
        return Err(ReferralError::Invalid(
            "max_uses must be at least 1".to_owned(),
        ));
    }

    if options.expires_at.is_some_and(|expires| expires <= now) {
        return Err(ReferralError::Invalid(
            "expires_at must be in the future".to_owned(),
        ));
    }

    Ok(discount)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_generated_code_shape() {
        for _ in 0..50 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(
                code.bytes()
                    .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
            );
            assert!(!code.contains(['0', 'O', '1', 'I']));
        }
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("  abcd2345 "), "ABCD2345");
    }

    #[test]
    fn test_default_discount() {
        let now = Utc::now();
        assert_eq!(
            validate_options(&CodeOptions::default(), now).unwrap(),
            DEFAULT_DISCOUNT_PERCENT
        );
    }

    #[test]
    fn test_discount_range() {
        let now = Utc::now();
        for bad in [0, 51, 100] {
            let options = CodeOptions {
                discount_percent: Some(bad),
                ..CodeOptions::default()
            };
            assert!(matches!(
                validate_options(&options, now),
                Err(ReferralError::Invalid(_))
            ));
        }
        let options = CodeOptions {
            discount_percent: Some(50),
            ..CodeOptions::default()
        };
        assert_eq!(validate_options(&options, now).unwrap(), 50);
    }

    #[test]
    fn test_max_uses_and_expiry() {
        let now = Utc::now();
        let options = CodeOptions {
            max_uses: Some(0),
            ..CodeOptions::default()
        };
        assert!(validate_options(&options, now).is_err());

        let options = CodeOptions {
            expires_at: Some(now - Duration::minutes(1)),
            ..CodeOptions::default()
        };
        assert!(validate_options(&options, now).is_err());

        let options = CodeOptions {
            max_uses: Some(3),
            expires_at: Some(now + Duration::days(30)),
            ..CodeOptions::default()
        };
        assert!(validate_options(&options, now).is_ok());
    }
}

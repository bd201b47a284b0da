//! Referral code repository.
//!
//! Redemption increments `usage_count` with a guarded `UPDATE` so concurrent
//! registrations can never push a code past `max_uses`.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use emporium_core::{OrderId, ReferralId, UserId};

use super::RepositoryError;
use crate::models::{NewReferral, Referral};

const REFERRAL_COLUMNS: &str = "id, code, owner_user_id, discount_percent, usage_count, max_uses, \
     expires_at, is_active, created_at";

#[derive(sqlx::FromRow)]
struct ReferralRow {
    id: ReferralId,
    code: String,
    owner_user_id: UserId,
    discount_percent: i16,
    usage_count: i32,
    max_uses: Option<i32>,
    expires_at: Option<DateTime<Utc>>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<ReferralRow> for Referral {
    type Error = RepositoryError;

    fn try_from(r: ReferralRow) -> Result<Self, Self::Error> {
        let discount_percent = u8::try_from(r.discount_percent).map_err(|_| {
            RepositoryError::DataCorruption(format!(
                "invalid referral discount in database: {}",
                r.discount_percent
            ))
        })?;

        Ok(Self {
            id: r.id,
            code: r.code,
            owner_user_id: r.owner_user_id,
            discount_percent,
            usage_count: r.usage_count,
            max_uses: r.max_uses,
            expires_at: r.expires_at,
            is_active: r.is_active,
            created_at: r.created_at,
        })
    }
}

/// Result of attempting to redeem a code for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedemptionOutcome {
    Redeemed,
    /// The user has already redeemed a referral code.
    AlreadyRedeemed,
    /// The code is inactive, expired, or at its usage limit.
    Exhausted,
}

/// A redeemed referral whose discount has not yet been applied to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct PendingDiscount {
    pub referral_id: ReferralId,
    pub discount_percent: i16,
}

/// Repository for referral database operations.
pub struct ReferralRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReferralRepository<'a> {
    /// Create a new referral repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new referral code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the code already exists.
    pub async fn create(&self, new: &NewReferral) -> Result<Referral, RepositoryError> {
        let row = sqlx::query_as::<_, ReferralRow>(&format!(
            "INSERT INTO storefront.referral \
                (code, owner_user_id, discount_percent, max_uses, expires_at) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {REFERRAL_COLUMNS}"
        ))
        .bind(&new.code)
        .bind(new.owner_user_id)
        .bind(i16::from(new.discount_percent))
        .bind(new.max_uses)
        .bind(new.expires_at)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "referral code already exists"))?;

        Referral::try_from(row)
    }

    /// Get a referral by its code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_code(&self, code: &str) -> Result<Option<Referral>, RepositoryError> {
        let row = sqlx::query_as::<_, ReferralRow>(&format!(
            "SELECT {REFERRAL_COLUMNS} FROM storefront.referral WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(self.pool)
        .await?;

        row.map(Referral::try_from).transpose()
    }

    /// Codes owned by a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_owner(&self, owner: UserId) -> Result<Vec<Referral>, RepositoryError> {
        let rows = sqlx::query_as::<_, ReferralRow>(&format!(
            "SELECT {REFERRAL_COLUMNS} FROM storefront.referral \
             WHERE owner_user_id = $1 \
             ORDER BY created_at DESC"
        ))
        .bind(owner)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Referral::try_from).collect()
    }

    /// Record that `user_id` redeemed a referral.
    ///
    /// The usage increment and the `referred_user` row are written together
    /// or not at all.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a statement fails.
    pub async fn record_redemption(
        &self,
        referral_id: ReferralId,
        user_id: UserId,
    ) -> Result<RedemptionOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r"
            INSERT INTO storefront.referred_user (referral_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO NOTHING
            ",
        )
        .bind(referral_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            return Ok(RedemptionOutcome::AlreadyRedeemed);
        }

        let incremented = sqlx::query(
            r"
            UPDATE storefront.referral
            SET usage_count = usage_count + 1, updated_at = NOW()
            WHERE id = $1
              AND is_active
              AND (expires_at IS NULL OR expires_at > NOW())
              AND (max_uses IS NULL OR usage_count < max_uses)
            ",
        )
        .bind(referral_id)
        .execute(&mut *tx)
        .await?;

        if incremented.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(RedemptionOutcome::Exhausted);
        }

        tx.commit().await?;
        Ok(RedemptionOutcome::Redeemed)
    }

    /// The referral discount a user is still owed on their first order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn pending_discount_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<PendingDiscount>, RepositoryError> {
        let discount = sqlx::query_as::<_, PendingDiscount>(
            r"
            SELECT r.id AS referral_id, r.discount_percent
            FROM storefront.referred_user ru
            JOIN storefront.referral r ON r.id = ru.referral_id
            WHERE ru.user_id = $1 AND ru.order_id IS NULL
            ",
        )
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(discount)
    }
}

/// Attach a user's unused redemption to an order inside a caller's transaction.
pub(crate) async fn attach_order_in(
    tx: &mut Transaction<'_, Postgres>,
    user_id: UserId,
    order_id: OrderId,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE storefront.referred_user
        SET order_id = $2
        WHERE user_id = $1 AND order_id IS NULL
        ",
    )
    .bind(user_id)
    .bind(order_id)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() > 0)
}

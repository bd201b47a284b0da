//! Address book repository.
//!
//! A partial unique index allows one `is_default` address per user and
//! type, so default changes always clear the previous default first inside
//! the same transaction.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use emporium_core::{AddressId, AddressType, UserId};

use super::RepositoryError;
use crate::models::{Address, AddressInput};

const ADDRESS_COLUMNS: &str = "id, user_id, address_type, full_name, street_line1, street_line2, \
     city, province, country, zip, phone, is_default, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct AddressRow {
    id: AddressId,
    user_id: UserId,
    address_type: AddressType,
    full_name: String,
    street_line1: String,
    street_line2: Option<String>,
    city: String,
    province: Option<String>,
    country: String,
    zip: String,
    phone: Option<String>,
    is_default: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AddressRow> for Address {
    fn from(r: AddressRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            address_type: r.address_type,
            full_name: r.full_name,
            street_line1: r.street_line1,
            street_line2: r.street_line2,
            city: r.city,
            province: r.province,
            country: r.country,
            zip: r.zip,
            phone: r.phone,
            is_default: r.is_default,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Repository for address database operations.
pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    /// Create a new address repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a user's addresses, defaults first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let rows = sqlx::query_as::<_, AddressRow>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM storefront.address \
             WHERE user_id = $1 \
             ORDER BY is_default DESC, created_at ASC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Address::from).collect())
    }

    /// Get one of a user's addresses.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Option<Address>, RepositoryError> {
        let row = sqlx::query_as::<_, AddressRow>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM storefront.address WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Address::from))
    }

    /// Create an address.
    ///
    /// The address becomes the default for its type when requested or when
    /// it is the user's first address of that type.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        user_id: UserId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let has_existing: bool = sqlx::query_scalar(
            r"
            SELECT EXISTS (
                SELECT 1 FROM storefront.address WHERE user_id = $1 AND address_type = $2
            )
            ",
        )
        .bind(user_id)
        .bind(input.address_type)
        .fetch_one(&mut *tx)
        .await?;

        let make_default = input.is_default || !has_existing;
        if make_default {
            clear_default(&mut tx, user_id, input.address_type).await?;
        }

        let row = sqlx::query_as::<_, AddressRow>(&format!(
            "INSERT INTO storefront.address \
                (user_id, address_type, full_name, street_line1, street_line2, \
                 city, province, country, zip, phone, is_default) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {ADDRESS_COLUMNS}"
        ))
        .bind(user_id)
        .bind(input.address_type)
        .bind(input.full_name.trim())
        .bind(input.street_line1.trim())
        .bind(&input.street_line2)
        .bind(input.city.trim())
        .bind(&input.province)
        .bind(input.country.trim())
        .bind(input.zip.trim())
        .bind(&input.phone)
        .bind(make_default)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Address::from(row))
    }

    /// Replace an address's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address does not belong to the user.
    pub async fn update(
        &self,
        user_id: UserId,
        id: AddressId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if input.is_default {
            clear_default(&mut tx, user_id, input.address_type).await?;
        }

        // A type change drops the old default flag unless a new one was requested.
        let row = sqlx::query_as::<_, AddressRow>(&format!(
            "UPDATE storefront.address SET \
                address_type = $3, full_name = $4, street_line1 = $5, street_line2 = $6, \
                city = $7, province = $8, country = $9, zip = $10, phone = $11, \
                is_default = CASE WHEN address_type <> $3 THEN $12 ELSE is_default OR $12 END, \
                updated_at = NOW() \
             WHERE id = $1 AND user_id = $2 \
             RETURNING {ADDRESS_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .bind(input.address_type)
        .bind(input.full_name.trim())
        .bind(input.street_line1.trim())
        .bind(&input.street_line2)
        .bind(input.city.trim())
        .bind(&input.province)
        .bind(input.country.trim())
        .bind(input.zip.trim())
        .bind(&input.phone)
        .bind(input.is_default)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        tx.commit().await?;

        Ok(Address::from(row))
    }

    /// Delete an address.
    ///
    /// # Returns
    ///
    /// Returns `true` if the address was deleted, `false` if it didn't exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, user_id: UserId, id: AddressId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.address WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Make an address the default for its type.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address does not belong to the user.
    pub async fn set_default(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let address_type: AddressType = sqlx::query_scalar(
            "SELECT address_type FROM storefront.address WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        clear_default(&mut tx, user_id, address_type).await?;

        let row = sqlx::query_as::<_, AddressRow>(&format!(
            "UPDATE storefront.address SET is_default = TRUE, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {ADDRESS_COLUMNS}"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Address::from(row))
    }
}

async fn clear_default(
    tx: &mut Transaction<'_, Postgres>,
    user_id: UserId,
    address_type: AddressType,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE storefront.address
        SET is_default = FALSE, updated_at = NOW()
        WHERE user_id = $1 AND address_type = $2 AND is_default
        ",
    )
    .bind(user_id)
    .bind(address_type)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

//! Address domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use emporium_core::{AddressId, AddressType, UserId};

/// A saved address in a user's address book.
#[derive(Debug, Clone, Serialize)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub address_type: AddressType,
    pub full_name: String,
    pub street_line1: String,
    pub street_line2: Option<String>,
    pub city: String,
    pub province: Option<String>,
    pub country: String,
    pub zip: String,
    pub phone: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when creating or replacing an address.
#[derive(Debug, Clone, Deserialize)]
pub struct AddressInput {
    #[serde(default = "default_address_type")]
    pub address_type: AddressType,
    pub full_name: String,
    pub street_line1: String,
    pub street_line2: Option<String>,
    pub city: String,
    pub province: Option<String>,
    pub country: String,
    pub zip: String,
    pub phone: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

const fn default_address_type() -> AddressType {
    AddressType::Shipping
}

impl AddressInput {
    /// Check that required fields are present.
    ///
    /// # Errors
    ///
    /// Returns the name of the first blank required field.
    pub fn validate(&self) -> Result<(), String> {
        for (field, value) in [
            ("full_name", &self.full_name),
            ("street_line1", &self.street_line1),
            ("city", &self.city),
            ("country", &self.country),
            ("zip", &self.zip),
        ] {
            if value.trim().is_empty() {
                return Err(format!("{field} is required"));
            }
        }
        Ok(())
    }
}

/// Address as copied onto an order (stored as JSONB).
///
/// Orders keep their own copy so later address-book edits do not rewrite
/// where an order was shipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSnapshot {
    pub full_name: String,
    pub street_line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street_line2: Option<String>,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
    pub country: String,
    pub zip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl AddressSnapshot {
    /// Check that required fields are present.
    ///
    /// # Errors
    ///
    /// Returns the name of the first blank required field.
    pub fn validate(&self) -> Result<(), String> {
        for (field, value) in [
            ("full_name", &self.full_name),
            ("street_line1", &self.street_line1),
            ("city", &self.city),
            ("country", &self.country),
            ("zip", &self.zip),
        ] {
            if value.trim().is_empty() {
                return Err(format!("{field} is required"));
            }
        }
        Ok(())
    }
}

impl From<&Address> for AddressSnapshot {
    fn from(address: &Address) -> Self {
        Self {
            full_name: address.full_name.clone(),
            street_line1: address.street_line1.clone(),
            street_line2: address.street_line2.clone(),
            city: address.city.clone(),
            province: address.province.clone(),
            country: address.country.clone(),
            zip: address.zip.clone(),
            phone: address.phone.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_address_input_defaults_to_shipping() {
        let input: AddressInput = serde_json::from_str(
            r#"{"full_name":"Ada Lovelace","street_line1":"12 St James's Sq",
                "city":"London","country":"GB","zip":"SW1Y 4JH"}"#,
        )
        .unwrap();
        assert_eq!(input.address_type, AddressType::Shipping);
        assert!(!input.is_default);
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_snapshot_validate_reports_blank_field() {
        let snapshot = AddressSnapshot {
            full_name: "Grace Hopper".to_string(),
            street_line1: "  ".to_string(),
            street_line2: None,
            city: "Arlington".to_string(),
            province: Some("VA".to_string()),
            country: "US".to_string(),
            zip: "22201".to_string(),
            phone: None,
        };
        assert_eq!(snapshot.validate(), Err("street_line1 is required".to_string()));
    }
}

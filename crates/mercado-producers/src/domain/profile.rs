//! What a producer declares about themselves when applying to a zone.

use mercado_core::error::DomainError;
use mercado_core::validation::{
    MAX_ADDRESS_LEN, MAX_DOCUMENT_LEN, MAX_NAME_LEN, MAX_PHONE_LEN, max_len, require_email,
    require_within,
};
use serde::{Deserialize, Serialize};

/// Producer data carried by an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerProfile {
    /// Full name of the producer or farm.
    pub producer_name: String,
    /// Identity document number.
    pub document: String,
    /// Contact phone.
    #[serde(default)]
    pub phone: Option<String>,
    /// Contact email.
    #[serde(default)]
    pub email: Option<String>,
    /// Farm or postal address.
    #[serde(default)]
    pub address: Option<String>,
    /// Free-text list of what the producer grows or makes.
    #[serde(default)]
    pub product_types: Option<String>,
}

impl ProducerProfile {
    /// Checks required fields and that everything fits the read model.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` naming the first offending field.
    pub fn validate(&self) -> Result<(), DomainError> {
        require_within("producer_name", &self.producer_name, MAX_NAME_LEN)?;
        require_within("document", &self.document, MAX_DOCUMENT_LEN)?;
        if let Some(phone) = present(self.phone.as_deref()) {
            max_len("phone", phone, MAX_PHONE_LEN)?;
        }
        if let Some(email) = present(self.email.as_deref()) {
            require_email("email", email)?;
        }
        if let Some(address) = present(self.address.as_deref()) {
            max_len("address", address, MAX_ADDRESS_LEN)?;
        }
        Ok(())
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

//! Zone details supplied with an affiliation request.

use mercado_core::error::DomainError;
use mercado_core::validation::{
    MAX_DOCUMENT_LEN, MAX_NAME_LEN, MAX_PHONE_LEN, max_len, require_email, require_within,
};
use serde::{Deserialize, Serialize};

/// How the zone can be reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    /// Contact phone number.
    #[serde(default)]
    pub phone: Option<String>,
    /// Contact email address.
    #[serde(default)]
    pub email: Option<String>,
}

/// The person representing the zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Representative {
    /// Full name.
    pub name: String,
    /// Identity document number.
    pub document: String,
    /// Email address.
    pub email: String,
}

/// Descriptive data of the zone asking to join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneDetails {
    /// Hamlet (vereda) name.
    pub hamlet_name: String,
    /// Municipality the hamlet belongs to.
    pub municipality: String,
    /// Zone contact channels.
    pub contact: ContactInfo,
    /// Zone representative.
    pub representative: Representative,
}

impl ZoneDetails {
    /// Checks that every required field is present, well formed and fits
    /// the read model.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` naming the first offending field.
    pub fn validate(&self) -> Result<(), DomainError> {
        require_within("hamlet_name", &self.hamlet_name, MAX_NAME_LEN)?;
        require_within("municipality", &self.municipality, MAX_NAME_LEN)?;

        let phone = self.contact.phone.as_deref().filter(|p| !p.trim().is_empty());
        let email = self.contact.email.as_deref().filter(|e| !e.trim().is_empty());
        if phone.is_none() && email.is_none() {
            return Err(DomainError::Validation(
                "contact requires a phone or an email".to_owned(),
            ));
        }
        if let Some(phone) = phone {
            max_len("contact.phone", phone, MAX_PHONE_LEN)?;
        }
        if let Some(email) = email {
            require_email("contact.email", email)?;
        }

        require_within("representative.name", &self.representative.name, MAX_NAME_LEN)?;
        require_within(
            "representative.document",
            &self.representative.document,
            MAX_DOCUMENT_LEN,
        )?;
        require_email("representative.email", &self.representative.email)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::{ContactInfo, Representative, ZoneDetails};

    pub(crate) fn zone_details() -> ZoneDetails {
        ZoneDetails {
            hamlet_name: "La Esperanza".to_owned(),
            municipality: "Fusagasugá".to_owned(),
            contact: ContactInfo {
                phone: Some("+57 300 000 0000".to_owned()),
                email: None,
            },
            representative: Representative {
                name: "Ana Gómez".to_owned(),
                document: "1010101010".to_owned(),
                email: "ana@example.com".to_owned(),
            },
        }
    }
}

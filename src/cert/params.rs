use bon::Builder;
use const_oid::ObjectIdentifier;
use const_oid::db::rfc4519;
use der::{Tag, Tagged};
use der::asn1::{Any, SetOfVec};
use serde::{Deserialize, Serialize};
use time::Duration;
use time::OffsetDateTime;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{RdnSequence, RelativeDistinguishedName};

use super::extensions::{AltName, ToAndFromX509Extension};
pub use crate::cert::extensions::ExtendedKeyUsageOption;
use crate::error::PkiError;
use crate::key::PublicKey;

/// Parameters for building an X.509 certificate.
///
/// # Fields
/// * `subject` - The distinguished name of the certificate subject.
/// * `subject_public_key` - The public key of the certificate subject.
/// * `usages` - A list of extended key usage options.
/// * `is_ca` - Indicates if the certificate is a CA.
/// * `max_path_length` - Path length constraint, only meaningful for a CA.
/// * `alt_names` - Subject alternative names.
/// * `extensions` - Additional X.509 extensions.
#[derive(Clone, Debug, Builder)]
pub struct CertificationRequestInfo {
    pub subject: DistinguishedName,
    pub subject_public_key: PublicKey,
    #[builder(default)]
    pub usages: Vec<ExtendedKeyUsageOption>,
    #[builder(default)]
    pub is_ca: bool,
    pub max_path_length: Option<u8>,
    #[builder(default)]
    pub alt_names: Vec<AltName>,
    #[builder(default)]
    pub extensions: Vec<ExtensionParam>,
}

/// Distinguished name parameters for building an X.509 certificate.
///
/// Only the attributes that are set end up in the encoded name, in the order
/// C, ST, L, O, OU, CN.
#[derive(Clone, Debug, Builder, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistinguishedName {
    pub common_name: Option<String>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub locality: Option<String>,
    pub organization: Option<String>,
    pub organization_unit: Option<String>,
}

impl DistinguishedName {
    /// A name carrying only a common name.
    pub fn from_common_name(cn: impl Into<String>) -> Self {
        DistinguishedName {
            common_name: Some(cn.into()),
            ..Default::default()
        }
    }

    /// Converts the distinguished name to an X.509-compatible format.
    pub fn as_x509_name(&self) -> Result<x509_cert::name::Name, PkiError> {
        let attributes = [
            (rfc4519::C, Tag::PrintableString, &self.country),
            (rfc4519::ST, Tag::Utf8String, &self.state),
            (rfc4519::L, Tag::Utf8String, &self.locality),
            (rfc4519::O, Tag::Utf8String, &self.organization),
            (rfc4519::OU, Tag::Utf8String, &self.organization_unit),
            (rfc4519::CN, Tag::Utf8String, &self.common_name),
        ];

        let mut rdns = Vec::new();
        for (oid, tag, value) in attributes {
            let Some(value) = value.as_deref().filter(|v| !v.is_empty()) else {
                continue;
            };
            let atv = AttributeTypeAndValue {
                oid,
                value: Any::new(tag, value.as_bytes())?,
            };
            rdns.push(RelativeDistinguishedName(SetOfVec::try_from(vec![atv])?));
        }

        if rdns.is_empty() {
            return Err(PkiError::InvalidInput(
                "distinguished name has no attributes".to_string(),
            ));
        }
        Ok(RdnSequence(rdns))
    }

    /// Creates a `DistinguishedName` from an X.509-compatible format.
    ///
    /// Attributes other than the six modelled here are ignored.
    pub fn from_x509_name(x509dn: &x509_cert::name::Name) -> Self {
        let mut dn = DistinguishedName::default();
        for rdn in x509dn.0.iter() {
            for attr in rdn.0.iter() {
                let Some(value) = attribute_string(attr) else {
                    continue;
                };
                let slot = match attr.oid {
                    rfc4519::CN => &mut dn.common_name,
                    rfc4519::C => &mut dn.country,
                    rfc4519::ST => &mut dn.state,
                    rfc4519::L => &mut dn.locality,
                    rfc4519::O => &mut dn.organization,
                    rfc4519::OU => &mut dn.organization_unit,
                    _ => continue,
                };
                *slot = Some(value);
            }
        }
        dn
    }
}

fn attribute_string(attr: &AttributeTypeAndValue) -> Option<String> {
    match attr.value.tag() {
        Tag::Utf8String | Tag::PrintableString | Tag::Ia5String | Tag::TeletexString => {
            std::str::from_utf8(attr.value.value())
                .ok()
                .map(str::to_string)
        }
        _ => None,
    }
}

/// Certificate validity period.
///
/// # Fields
/// * `not_before` - The start of the validity period.
/// * `not_after` - The end of the validity period.
#[derive(Clone, Debug)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    /// Creates a validity period starting now for the given number of days.
    ///
    /// Fails when the end falls outside the representable date range.
    pub fn for_days(days: i64) -> Result<Self, PkiError> {
        let now = OffsetDateTime::now_utc();
        let not_after = days
            .checked_mul(SECONDS_PER_DAY)
            .and_then(|secs| now.checked_add(Duration::seconds(secs)))
            .ok_or_else(|| out_of_range(format!("{days} days")))?;
        Ok(Self {
            not_before: now,
            not_after,
        })
    }

    /// Creates a validity period starting now for the given number of
    /// calendar years (leap days included).
    pub fn for_years(years: i32) -> Result<Self, PkiError> {
        let now = OffsetDateTime::now_utc();
        let not_after = now
            .year()
            .checked_add(years)
            .and_then(|year| now.replace_year(year).ok())
            // 29 February in a non-leap target year
            .or_else(|| {
                i64::from(years)
                    .checked_mul(365 * SECONDS_PER_DAY)
                    .and_then(|secs| now.checked_add(Duration::seconds(secs)))
            })
            .ok_or_else(|| out_of_range(format!("{years} years")))?;
        Ok(Self {
            not_before: now,
            not_after,
        })
    }
}

const SECONDS_PER_DAY: i64 = 86_400;

fn out_of_range(period: String) -> PkiError {
    PkiError::InvalidInput(format!(
        "validity period of {period} ends outside the supported date range"
    ))
}

/// Represents an X.509 extension.
///
/// # Fields
/// * `oid` - The object identifier of the extension.
/// * `critical` - Indicates if the extension is critical.
/// * `value` - The DER-encoded value of the extension.
#[derive(Clone, Debug)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// DER-encoded extension value
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Creates an `ExtensionParam` from a specific extension.
    pub fn from_extension<E: ToAndFromX509Extension>(
        extension: E,
        critical: bool,
    ) -> Result<Self, PkiError> {
        Ok(Self {
            oid: E::OID,
            critical,
            value: extension.to_x509_extension_value()?,
        })
    }

    /// Decodes an `ExtensionParam` into a specific extension.
    pub fn to_extension<E: ToAndFromX509Extension>(&self) -> Result<E, PkiError> {
        E::from_x509_extension_value(&self.value)
    }
}

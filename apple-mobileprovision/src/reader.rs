// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Human readable descriptions of provisioning profiles.

use {
    crate::{
        asn1::{SignerIdentifier, SignerInfo},
        verify, MobileProvisionError, ProvisioningProfile,
    },
    chrono::{DateTime, Utc},
    log::{debug, warn},
    serde::Serialize,
    x509_certificate::{CapturedX509Certificate, DigestAlgorithm},
};

#[derive(Clone, Debug, Serialize)]
pub struct CertificateInfo {
    pub subject: String,
    pub issuer: String,
    pub serial_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_algorithm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_algorithm: Option<String>,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub sha256_fingerprint: String,
}

impl TryFrom<&CapturedX509Certificate> for CertificateInfo {
    type Error = MobileProvisionError;

    fn try_from(cert: &CapturedX509Certificate) -> Result<Self, Self::Error> {
        Ok(Self {
            subject: cert.subject_name().user_friendly_str()?,
            issuer: cert.issuer_name().user_friendly_str()?,
            serial_number: hex::encode(cert.serial_number_asn1().as_slice()),
            key_algorithm: cert.key_algorithm().map(|x| x.to_string()),
            signature_algorithm: cert.signature_algorithm().map(|x| x.to_string()),
            not_before: cert.validity_not_before(),
            not_after: cert.validity_not_after(),
            sha256_fingerprint: hex::encode(
                DigestAlgorithm::Sha256.digest_data(cert.constructed_data()),
            ),
        })
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct SignerInfoSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_key_identifier: Option<String>,
    pub digest_algorithm: String,
    pub signature_algorithm: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_digest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_time: Option<DateTime<Utc>>,
    pub signature_verifies: bool,
}

impl SignerInfoSummary {
    pub fn from_signer_info_and_profile(
        signer: &SignerInfo,
        profile: &ProvisioningProfile,
    ) -> Result<Self, MobileProvisionError> {
        let (issuer, serial_number, subject_key_identifier) = match &signer.sid {
            SignerIdentifier::IssuerAndSerialNumber {
                issuer,
                serial_number,
            } => (
                Some(issuer.user_friendly_str()?),
                Some(hex::encode(serial_number.as_slice())),
                None,
            ),
            SignerIdentifier::SubjectKeyIdentifier(identifier) => {
                (None, None, Some(hex::encode(identifier)))
            }
        };

        let mut content_type = None;
        let mut message_digest = None;
        let mut signing_time = None;

        // Malformed attributes are reported as absent. Verification reports them.
        if let Some(attributes) = &signer.signed_attributes {
            content_type = attributes
                .content_type()
                .unwrap_or_else(|err| {
                    warn!("ignoring malformed content-type attribute: {}", err);
                    None
                })
                .map(|oid| oid.to_string());
            message_digest = attributes
                .message_digest()
                .unwrap_or_else(|err| {
                    warn!("ignoring malformed message-digest attribute: {}", err);
                    None
                })
                .map(hex::encode);
            signing_time = attributes.signing_time().unwrap_or_else(|err| {
                warn!("ignoring malformed signing-time attribute: {}", err);
                None
            });
        }

        let digest_algorithm = &signer.digest_algorithm.algorithm;

        // Detached signatures can't be verified without the external content.
        let signature_verifies = match &profile.signed_data().content_info.content {
            Some(content) => {
                let res = verify::verify_content_type(signer, profile.content_type())
                    .and_then(|_| profile.signer_certificate(signer))
                    .and_then(|cert| verify::verify_signer(signer, cert, content));

                if let Err(err) = &res {
                    debug!("signature verification failed: {}", err);
                }

                res.is_ok()
            }
            None => false,
        };

        Ok(Self {
            issuer,
            serial_number,
            subject_key_identifier,
            digest_algorithm: DigestAlgorithm::try_from(digest_algorithm)
                .map(|x| x.to_string())
                .unwrap_or_else(|_| digest_algorithm.to_string()),
            signature_algorithm: signer.signature_algorithm.algorithm.to_string(),
            content_type,
            message_digest,
            signing_time,
            signature_verifies,
        })
    }
}

/// High-level representation of a provisioning profile.
#[derive(Clone, Debug, Serialize)]
pub struct ProfileInfo {
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_sha256: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub certificates: Vec<CertificateInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub signers: Vec<SignerInfoSummary>,
}

impl TryFrom<&ProvisioningProfile> for ProfileInfo {
    type Error = MobileProvisionError;

    fn try_from(profile: &ProvisioningProfile) -> Result<Self, Self::Error> {
        let content = profile.signed_data().content_info.content.as_ref();

        let certificates = profile
            .certificates()
            .map(|x| x.try_into())
            .collect::<Result<Vec<_>, _>>()?;

        let signers = profile
            .signers()
            .map(|x| SignerInfoSummary::from_signer_info_and_profile(x, profile))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            content_type: profile.content_type().to_string(),
            content_length: content.map(|x| x.len()),
            content_sha256: content.map(|x| hex::encode(DigestAlgorithm::Sha256.digest_data(x))),
            certificates,
            signers,
        })
    }
}

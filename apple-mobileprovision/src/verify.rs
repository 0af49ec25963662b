// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Signature verification for individual signers.

# IMPORTANT SECURITY LIMITATIONS

The functions in this module only verify cryptographic integrity: that the
content digest matches what was signed and that the signature was produced by
the key in the referenced certificate. They DO NOT validate the certificate
chain, expiration, or revocation status of the signing certificate. A profile
that verifies is therefore not necessarily trustworthy.
*/

use {
    crate::{
        asn1::{SignerIdentifier, SignerInfo},
        MobileProvisionError,
    },
    bcder::Oid,
    log::debug,
    x509_certificate::{CapturedX509Certificate, DigestAlgorithm, SignatureAlgorithm},
};

/// Resolve the certificate a signer references.
pub fn find_signer_certificate<'a>(
    signer: &SignerInfo,
    mut certs: impl Iterator<Item = &'a CapturedX509Certificate>,
) -> Result<&'a CapturedX509Certificate, MobileProvisionError> {
    match &signer.sid {
        SignerIdentifier::IssuerAndSerialNumber {
            issuer,
            serial_number,
        } => certs
            .find(|cert| {
                cert.issuer_name() == issuer && cert.serial_number_asn1() == serial_number
            })
            .ok_or(MobileProvisionError::CertificateNotFound),
        SignerIdentifier::SubjectKeyIdentifier(_) => {
            Err(MobileProvisionError::SubjectKeyIdentifierUnsupported)
        }
    }
}

/// Obtain the raw bytes that were digested and signed.
///
/// If signed attributes are present, this is their DER encoding with an
/// `EXPLICIT SET OF` tag (RFC 5652 Section 5.4). Otherwise it is the content.
pub fn signed_content(signer: &SignerInfo, content: &[u8]) -> Vec<u8> {
    if let Some(attributes) = &signer.signed_attributes {
        attributes.digested_data()
    } else {
        content.to_vec()
    }
}

/// Verify the `message-digest` signed attribute against content.
///
/// Signers without signed attributes have nothing to compare and pass.
pub fn verify_message_digest(
    signer: &SignerInfo,
    content: &[u8],
) -> Result<(), MobileProvisionError> {
    let attributes = if let Some(attributes) = &signer.signed_attributes {
        attributes
    } else {
        return Ok(());
    };

    let wanted = attributes
        .message_digest()
        .map_err(|_| MobileProvisionError::MalformedSignedAttributeMessageDigest)?
        .ok_or(MobileProvisionError::MissingSignedAttributeMessageDigest)?;

    let digest_algorithm = DigestAlgorithm::try_from(&signer.digest_algorithm.algorithm)?;
    let got = digest_algorithm.digest_data(content);

    if wanted.as_ref() == got.as_slice() {
        Ok(())
    } else {
        Err(MobileProvisionError::DigestNotEqual)
    }
}

/// Verify the `content-type` signed attribute against the encapsulated content type.
///
/// RFC 5652 requires the attribute whenever signed attributes are present.
pub fn verify_content_type(
    signer: &SignerInfo,
    content_type: &Oid,
) -> Result<(), MobileProvisionError> {
    let attributes = if let Some(attributes) = &signer.signed_attributes {
        attributes
    } else {
        return Ok(());
    };

    let attribute = attributes
        .content_type()?
        .ok_or(MobileProvisionError::MissingSignedAttributeContentType)?;

    if &attribute == content_type {
        Ok(())
    } else {
        Err(MobileProvisionError::ContentTypeAttributeMismatch(
            content_type.clone(),
        ))
    }
}

/// Verify the signature of a signer over content with a known certificate.
pub fn verify_signer(
    signer: &SignerInfo,
    cert: &CapturedX509Certificate,
    content: &[u8],
) -> Result<(), MobileProvisionError> {
    verify_message_digest(signer, content)?;

    let digest_algorithm = DigestAlgorithm::try_from(&signer.digest_algorithm.algorithm)?;
    let signature_algorithm = SignatureAlgorithm::from_oid_and_digest_algorithm(
        &signer.signature_algorithm.algorithm,
        digest_algorithm,
    )?;
    let key_algorithm = cert
        .key_algorithm()
        .ok_or(MobileProvisionError::UnknownKeyAlgorithm)?;
    let verify_algorithm = signature_algorithm.resolve_verification_algorithm(key_algorithm)?;

    debug!(
        "verifying {} signature with {} key",
        signature_algorithm, key_algorithm
    );

    cert.verify_signed_data_with_algorithm(
        signed_content(signer, content),
        &signer.signature,
        verify_algorithm,
    )?;

    Ok(())
}

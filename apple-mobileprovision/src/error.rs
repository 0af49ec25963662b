// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {bcder::Oid, thiserror::Error, x509_certificate::X509CertificateError};

/// Unified error type for provisioning profile handling.
#[derive(Debug, Error)]
pub enum MobileProvisionError {
    #[error("unknown command")]
    CliUnknownCommand,

    #[error("bad argument")]
    CliBadArgument,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ASN.1 decode error: {0}")]
    Decode(#[from] bcder::decode::DecodeError<std::convert::Infallible>),

    #[error("error encoding SignedData: {0}")]
    Encode(std::io::Error),

    #[error("encapsulated content type is {0}, not id-data")]
    ContentTypeNotData(Oid),

    #[error("SignedData does not contain encapsulated content (detached signature)")]
    ContentAbsent,

    #[error("SignedData does not have any signers")]
    NoSigners,

    #[error("signing certificate not found in SignedData")]
    CertificateNotFound,

    #[error("signer info using subject key identifier is not supported")]
    SubjectKeyIdentifierUnsupported,

    #[error("unable to resolve key algorithm of signing certificate")]
    UnknownKeyAlgorithm,

    #[error("message-digest attribute missing from SignedAttributes")]
    MissingSignedAttributeMessageDigest,

    #[error("message-digest attribute in SignedAttributes is malformed")]
    MalformedSignedAttributeMessageDigest,

    #[error("digest of content does not match message-digest attribute")]
    DigestNotEqual,

    #[error("content-type attribute missing from SignedAttributes")]
    MissingSignedAttributeContentType,

    #[error("content-type attribute does not match encapsulated content type {0}")]
    ContentTypeAttributeMismatch(Oid),

    #[error("X.509 certificate handler error: {0}")]
    X509(#[from] X509CertificateError),

    #[error("YAML serialization error: {0}")]
    SerdeYaml(#[from] serde_yaml::Error),
}

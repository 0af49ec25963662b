// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! ASN.1 data structures for the CMS container wrapping provisioning profiles.

The types in this module mirror the RFC 5652 definitions closely and are only
meant to be used for (de)serialization. Most applications should go through
[crate::ProvisioningProfile] instead.

Only the parts of `SignedData` we need to interpret are decoded into Rust
fields. Everything else (certificates, CRLs, unsigned attributes) is kept as
the [Captured] encoding it was read from, so writing a structure back out
reproduces those values exactly.
*/

use {
    bcder::{
        decode::{BytesSource, Constructed, DecodeError, SliceSource, Source},
        encode::{self, PrimitiveContent, Values},
        Captured, ConstOid, Integer, Mode, OctetString, Oid, Tag,
    },
    bytes::Bytes,
    std::{convert::Infallible, io::Write},
    x509_certificate::{asn1time::Time, rfc3280::Name},
};

/// The data content type.
///
/// `id-data` in RFC 5652.
///
/// 1.2.840.113549.1.7.1
pub const OID_ID_DATA: ConstOid = Oid(&[42, 134, 72, 134, 247, 13, 1, 7, 1]);

/// The signed-data content type.
///
/// 1.2.840.113549.1.7.2
pub const OID_ID_SIGNED_DATA: ConstOid = Oid(&[42, 134, 72, 134, 247, 13, 1, 7, 2]);

/// Identifies the content-type attribute.
///
/// 1.2.840.113549.1.9.3
pub const OID_CONTENT_TYPE: ConstOid = Oid(&[42, 134, 72, 134, 247, 13, 1, 9, 3]);

/// Identifies the message-digest attribute.
///
/// 1.2.840.113549.1.9.4
pub const OID_MESSAGE_DIGEST: ConstOid = Oid(&[42, 134, 72, 134, 247, 13, 1, 9, 4]);

/// Identifies the signing-time attribute.
///
/// 1.2.840.113549.1.9.5
pub const OID_SIGNING_TIME: ConstOid = Oid(&[42, 134, 72, 134, 247, 13, 1, 9, 5]);

/// Capture each remaining value of a constructed value individually.
fn capture_each<S: Source>(
    cons: &mut Constructed<S>,
) -> Result<Vec<Captured>, DecodeError<S::Error>> {
    let mut values = Vec::new();

    loop {
        let mut found = false;

        // skip_opt() also consumes the end-of-contents marker of indefinite
        // length values, which the capture then holds.
        let captured = cons.capture(|cons| {
            found = cons.skip_opt(|_, _, _| Ok(()))?.is_some();
            Ok(())
        })?;

        if !found {
            break;
        }

        values.push(captured);
    }

    Ok(values)
}

/// Signed data wrapped in its `ContentInfo`.
///
/// ```ASN.1
/// ContentInfo ::= SEQUENCE {
///   contentType ContentType,
///   content [0] EXPLICIT ANY DEFINED BY contentType }
///
/// SignedData ::= SEQUENCE {
///   version CMSVersion,
///   digestAlgorithms DigestAlgorithmIdentifiers,
///   encapContentInfo EncapsulatedContentInfo,
///   certificates [0] IMPLICIT CertificateSet OPTIONAL,
///   crls [1] IMPLICIT RevocationInfoChoices OPTIONAL,
///   signerInfos SignerInfos }
/// ```
#[derive(Clone, Debug)]
pub struct SignedData {
    pub version: u8,
    pub digest_algorithms: Vec<AlgorithmIdentifier>,
    pub content_info: EncapsulatedContentInfo,
    /// Each entry is the encoding of a single `CertificateChoices` value.
    pub certificates: Option<Vec<Captured>>,
    /// Each entry is the encoding of a single `RevocationInfoChoice` value.
    pub crls: Option<Vec<Captured>>,
    pub signer_infos: Vec<SignerInfo>,
}

impl SignedData {
    /// Attempt to decode BER encoded bytes to a parsed data structure.
    ///
    /// The bytes must hold a complete `ContentInfo` whose content type is
    /// `id-signedData`. Trailing data is rejected.
    pub fn decode_ber(data: &[u8]) -> Result<Self, DecodeError<Infallible>> {
        let mut source = SliceSource::new(data);
        let signed_data = Constructed::decode(&mut source, Mode::Ber, |cons| Self::decode(cons))?;

        // Top-level decoding stops after the first value.
        if !source.is_empty() {
            return Err(DecodeError::content(
                "trailing data after ContentInfo",
                source.pos(),
            ));
        }

        Ok(signed_data)
    }

    pub fn decode<S: Source>(cons: &mut Constructed<S>) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let oid = Oid::take_from(cons)?;

            if oid != OID_ID_SIGNED_DATA {
                return Err(cons.content_err("content type is not id-signedData"));
            }

            cons.take_constructed_if(Tag::CTX_0, Self::take_from)
        })
    }

    pub fn take_from<S: Source>(cons: &mut Constructed<S>) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let version = cons.take_u8()?;
            let digest_algorithms = cons.take_set(|cons| {
                let mut algorithms = Vec::new();

                while let Some(algorithm) = AlgorithmIdentifier::take_opt_from(cons)? {
                    algorithms.push(algorithm);
                }

                Ok(algorithms)
            })?;
            let content_info = EncapsulatedContentInfo::take_from(cons)?;
            let certificates = cons.take_opt_constructed_if(Tag::CTX_0, capture_each)?;
            let crls = cons.take_opt_constructed_if(Tag::CTX_1, capture_each)?;
            let signer_infos = cons.take_set(|cons| {
                let mut infos = Vec::new();

                while let Some(info) = SignerInfo::take_opt_from(cons)? {
                    infos.push(info);
                }

                Ok(infos)
            })?;

            Ok(Self {
                version,
                digest_algorithms,
                content_info,
                certificates,
                crls,
                signer_infos,
            })
        })
    }

    /// Encode the full `ContentInfo` structure.
    ///
    /// Captured members are written verbatim, so this must be serialized in
    /// BER mode. Lengths are always definite, which yields DER when the
    /// captured members were DER to begin with.
    pub fn encode_ref(&self) -> impl Values + '_ {
        encode::sequence((
            OID_ID_SIGNED_DATA.encode_ref(),
            encode::sequence_as(
                Tag::CTX_0,
                encode::sequence((
                    self.version.encode(),
                    encode::set(&self.digest_algorithms),
                    self.content_info.encode_ref(),
                    self.certificates
                        .as_ref()
                        .map(|certs| encode::sequence_as(Tag::CTX_0, certs)),
                    self.crls
                        .as_ref()
                        .map(|crls| encode::sequence_as(Tag::CTX_1, crls)),
                    encode::set(&self.signer_infos),
                )),
            ),
        ))
    }
}

/// Algorithm identifier.
///
/// ```ASN.1
/// AlgorithmIdentifier ::= SEQUENCE {
///   algorithm OBJECT IDENTIFIER,
///   parameters ANY DEFINED BY algorithm OPTIONAL }
/// ```
#[derive(Clone, Debug)]
pub struct AlgorithmIdentifier {
    pub algorithm: Oid,
    pub parameters: Option<Captured>,
}

impl AlgorithmIdentifier {
    pub fn take_from<S: Source>(cons: &mut Constructed<S>) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| Self::from_sequence(cons))
    }

    pub fn take_opt_from<S: Source>(
        cons: &mut Constructed<S>,
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        cons.take_opt_sequence(|cons| Self::from_sequence(cons))
    }

    fn from_sequence<S: Source>(cons: &mut Constructed<S>) -> Result<Self, DecodeError<S::Error>> {
        let algorithm = Oid::take_from(cons)?;
        let mut parameters = capture_each(cons)?;

        if parameters.len() > 1 {
            return Err(cons.content_err("unexpected values in AlgorithmIdentifier"));
        }

        Ok(Self {
            algorithm,
            parameters: parameters.pop(),
        })
    }
}

impl Values for AlgorithmIdentifier {
    fn encoded_len(&self, mode: Mode) -> usize {
        encode::sequence((self.algorithm.encode_ref(), self.parameters.as_ref())).encoded_len(mode)
    }

    fn write_encoded<W: Write>(&self, mode: Mode, target: &mut W) -> Result<(), std::io::Error> {
        encode::sequence((self.algorithm.encode_ref(), self.parameters.as_ref()))
            .write_encoded(mode, target)
    }
}

/// Encapsulated content info.
///
/// ```ASN.1
/// EncapsulatedContentInfo ::= SEQUENCE {
///   eContentType ContentType,
///   eContent [0] EXPLICIT OCTET STRING OPTIONAL }
/// ```
///
/// Apple tooling emits `eContent` as a constructed (chunked) OCTET STRING.
/// The chunks are joined on decode and written back as a single primitive
/// value.
#[derive(Clone, Debug)]
pub struct EncapsulatedContentInfo {
    pub content_type: Oid,
    pub content: Option<Bytes>,
}

impl EncapsulatedContentInfo {
    pub fn take_from<S: Source>(cons: &mut Constructed<S>) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let content_type = Oid::take_from(cons)?;
            let content = cons
                .take_opt_constructed_if(Tag::CTX_0, |cons| OctetString::take_from(cons))?
                .map(|octets| octets.into_bytes());

            Ok(Self {
                content_type,
                content,
            })
        })
    }

    pub fn encode_ref(&self) -> impl Values + '_ {
        encode::sequence((
            self.content_type.encode_ref(),
            self.content.as_ref().map(|content| {
                encode::sequence_as(Tag::CTX_0, OctetString::encode_slice(&content[..]))
            }),
        ))
    }
}

/// Per-signer information.
///
/// ```ASN.1
/// SignerInfo ::= SEQUENCE {
///   version CMSVersion,
///   sid SignerIdentifier,
///   digestAlgorithm DigestAlgorithmIdentifier,
///   signedAttrs [0] IMPLICIT SignedAttributes OPTIONAL,
///   signatureAlgorithm SignatureAlgorithmIdentifier,
///   signature SignatureValue,
///   unsignedAttrs [1] IMPLICIT UnsignedAttributes OPTIONAL }
/// ```
#[derive(Clone, Debug)]
pub struct SignerInfo {
    pub version: u8,
    pub sid: SignerIdentifier,
    pub digest_algorithm: AlgorithmIdentifier,
    pub signed_attributes: Option<SignedAttributes>,
    pub signature_algorithm: AlgorithmIdentifier,
    pub signature: Bytes,
    /// Each entry is the encoding of a single unsigned `Attribute`.
    pub unsigned_attributes: Option<Vec<Captured>>,

    /// The encoding this value was decoded from.
    raw: Captured,
}

impl SignerInfo {
    pub fn take_opt_from<S: Source>(
        cons: &mut Constructed<S>,
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        let mut info = None;

        let raw = cons.capture(|cons| {
            info = cons.take_opt_sequence(|cons| Self::from_sequence(cons))?;
            Ok(())
        })?;

        Ok(info.map(|info| Self { raw, ..info }))
    }

    fn from_sequence<S: Source>(cons: &mut Constructed<S>) -> Result<Self, DecodeError<S::Error>> {
        let version = cons.take_u8()?;
        let sid = SignerIdentifier::take_from(cons)?;
        let digest_algorithm = AlgorithmIdentifier::take_from(cons)?;
        let signed_attributes =
            cons.take_opt_constructed_if(Tag::CTX_0, |cons| SignedAttributes::take_from(cons))?;
        let signature_algorithm = AlgorithmIdentifier::take_from(cons)?;
        let signature = OctetString::take_from(cons)?.into_bytes();
        let unsigned_attributes = cons.take_opt_constructed_if(Tag::CTX_1, capture_each)?;

        Ok(Self {
            version,
            sid,
            digest_algorithm,
            signed_attributes,
            signature_algorithm,
            signature,
            unsigned_attributes,
            raw: Captured::empty(cons.mode()),
        })
    }

    /// The encoded form of this value, as it was read.
    pub fn raw(&self) -> &[u8] {
        self.raw.as_slice()
    }
}

impl Values for SignerInfo {
    fn encoded_len(&self, mode: Mode) -> usize {
        self.raw.encoded_len(mode)
    }

    fn write_encoded<W: Write>(&self, mode: Mode, target: &mut W) -> Result<(), std::io::Error> {
        self.raw.write_encoded(mode, target)
    }
}

/// Identifies the certificate of a signer.
///
/// ```ASN.1
/// SignerIdentifier ::= CHOICE {
///   issuerAndSerialNumber IssuerAndSerialNumber,
///   subjectKeyIdentifier [0] SubjectKeyIdentifier }
///
/// IssuerAndSerialNumber ::= SEQUENCE {
///   issuer Name,
///   serialNumber CertificateSerialNumber }
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SignerIdentifier {
    IssuerAndSerialNumber { issuer: Name, serial_number: Integer },
    SubjectKeyIdentifier(Bytes),
}

impl SignerIdentifier {
    pub fn take_from<S: Source>(cons: &mut Constructed<S>) -> Result<Self, DecodeError<S::Error>> {
        if let Some(identifier) = cons.take_opt_primitive_if(Tag::CTX_0, |prim| prim.take_all())? {
            return Ok(Self::SubjectKeyIdentifier(identifier));
        }

        cons.take_sequence(|cons| {
            let issuer = Name::take_from(cons)?;
            let serial_number = Integer::take_from(cons)?;

            Ok(Self::IssuerAndSerialNumber {
                issuer,
                serial_number,
            })
        })
    }
}

/// Signed attributes.
///
/// ```ASN.1
/// SignedAttributes ::= SET SIZE (1..MAX) OF Attribute
/// ```
///
/// The signature of a signer covers the DER encoding of this SET. Since the
/// value is transmitted with an implicit `[0]` tag, we retain its content so
/// the signed form can be reconstructed without re-encoding the attributes.
#[derive(Clone, Debug)]
pub struct SignedAttributes {
    pub attributes: Vec<Attribute>,
    raw: Captured,
}

impl SignedAttributes {
    pub fn take_from<S: Source>(cons: &mut Constructed<S>) -> Result<Self, DecodeError<S::Error>> {
        let mut attributes = Vec::new();

        let raw = cons.capture(|cons| {
            while let Some(attribute) = Attribute::take_opt_from(cons)? {
                attributes.push(attribute);
            }

            Ok(())
        })?;

        Ok(Self { attributes, raw })
    }

    /// Find the first attribute having the given type.
    pub fn find(&self, typ: ConstOid) -> Option<&Attribute> {
        self.attributes.iter().find(|attr| attr.typ == typ)
    }

    /// The data over which the signature of the signer was computed.
    pub fn digested_data(&self) -> Vec<u8> {
        encode::set(&self.raw)
            .to_captured(Mode::Ber)
            .into_bytes()
            .to_vec()
    }

    /// Obtain the value of the `content-type` attribute.
    pub fn content_type(&self) -> Result<Option<Oid>, DecodeError<Infallible>> {
        self.find(OID_CONTENT_TYPE)
            .and_then(|attr| attr.decode_first_value(|cons| Oid::take_from(cons)))
            .transpose()
    }

    /// Obtain the value of the `message-digest` attribute.
    pub fn message_digest(&self) -> Result<Option<Bytes>, DecodeError<Infallible>> {
        self.find(OID_MESSAGE_DIGEST)
            .and_then(|attr| attr.decode_first_value(|cons| OctetString::take_from(cons)))
            .map(|res| res.map(|octets| octets.into_bytes()))
            .transpose()
    }

    /// Obtain the value of the `signing-time` attribute.
    pub fn signing_time(
        &self,
    ) -> Result<Option<chrono::DateTime<chrono::Utc>>, DecodeError<Infallible>> {
        self.find(OID_SIGNING_TIME)
            .and_then(|attr| attr.decode_first_value(|cons| Time::take_from(cons)))
            .map(|res| res.map(chrono::DateTime::from))
            .transpose()
    }
}

/// Attribute.
///
/// ```ASN.1
/// Attribute ::= SEQUENCE {
///   attrType OBJECT IDENTIFIER,
///   attrValues SET OF AttributeValue }
/// ```
#[derive(Clone, Debug)]
pub struct Attribute {
    pub typ: Oid,
    pub values: Vec<Captured>,
}

impl Attribute {
    pub fn take_opt_from<S: Source>(
        cons: &mut Constructed<S>,
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        cons.take_opt_sequence(|cons| {
            let typ = Oid::take_from(cons)?;
            let values = cons.take_set(capture_each)?;

            Ok(Self { typ, values })
        })
    }

    /// Decode the first value of this attribute, if there is one.
    pub fn decode_first_value<F, T>(&self, op: F) -> Option<Result<T, DecodeError<Infallible>>>
    where
        F: FnOnce(&mut Constructed<BytesSource>) -> Result<T, DecodeError<Infallible>>,
    {
        self.values.first().map(|value| value.clone().decode(op))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const HELLO: &[u8] = include_bytes!("testdata/hello.der");
    const SIGNED_DER: &[u8] = include_bytes!("testdata/signed.mobileprovision");
    const SIGNED_BER: &[u8] = include_bytes!("testdata/signed-ber.mobileprovision");

    fn encode(signed_data: &SignedData) -> Vec<u8> {
        let mut buffer = Vec::new();
        signed_data
            .encode_ref()
            .write_encoded(Mode::Ber, &mut buffer)
            .unwrap();

        buffer
    }

    #[test]
    fn decode_minimal() {
        let signed_data = SignedData::decode_ber(HELLO).unwrap();

        assert_eq!(signed_data.version, 1);
        assert!(signed_data.digest_algorithms.is_empty());
        assert_eq!(signed_data.content_info.content_type, OID_ID_DATA);
        assert_eq!(
            signed_data.content_info.content.as_deref(),
            Some(b"hello".as_ref())
        );
        assert!(signed_data.certificates.is_none());
        assert!(signed_data.crls.is_none());
        assert!(signed_data.signer_infos.is_empty());

        assert_eq!(encode(&signed_data), HELLO);
    }

    #[test]
    fn decode_signed_der() {
        let signed_data = SignedData::decode_ber(SIGNED_DER).unwrap();

        assert_eq!(signed_data.digest_algorithms.len(), 1);
        assert!(signed_data.digest_algorithms[0].parameters.is_none());
        assert_eq!(signed_data.certificates.as_ref().map(|x| x.len()), Some(1));
        assert_eq!(signed_data.signer_infos.len(), 1);

        let signer = &signed_data.signer_infos[0];
        assert_eq!(signer.version, 1);
        assert!(matches!(
            signer.sid,
            SignerIdentifier::IssuerAndSerialNumber { .. }
        ));
        assert_eq!(signer.signature.len(), 256);

        let attrs = signer.signed_attributes.as_ref().unwrap();
        assert_eq!(attrs.content_type().unwrap(), Some(Oid(OID_ID_DATA.0.into())));
        assert_eq!(attrs.message_digest().unwrap().map(|x| x.len()), Some(32));
        assert!(attrs.signing_time().unwrap().is_some());

        let digested = attrs.digested_data();
        assert_eq!(digested[0], 0x31);

        // DER input is reproduced exactly.
        assert_eq!(encode(&signed_data), SIGNED_DER);
    }

    #[test]
    fn decode_signed_ber() {
        let ber = SignedData::decode_ber(SIGNED_BER).unwrap();
        let der = SignedData::decode_ber(SIGNED_DER).unwrap();

        assert_eq!(ber.content_info.content, der.content_info.content);
        assert_eq!(ber.signer_infos.len(), 1);

        // Indefinite lengths are normalized away.
        let encoded = encode(&ber);
        assert_ne!(encoded, SIGNED_BER);

        let reparsed = SignedData::decode_ber(&encoded).unwrap();
        assert_eq!(reparsed.content_info.content, der.content_info.content);
        assert_eq!(reparsed.signer_infos[0].raw(), ber.signer_infos[0].raw());
    }

    #[test]
    fn reject_wrong_content_type() {
        // ContentInfo with an id-data content type.
        let data = b"\x30\x0f\x06\x09\x2a\x86\x48\x86\xf7\x0d\x01\x07\x01\xa0\x02\x04\x00";

        assert!(SignedData::decode_ber(data).is_err());
    }

    #[test]
    fn reject_truncated() {
        for len in [0, 1, 2, 13, HELLO.len() - 1] {
            assert!(SignedData::decode_ber(&HELLO[0..len]).is_err(), "{}", len);
        }
    }

    #[test]
    fn reject_trailing_data() {
        for input in [HELLO, SIGNED_DER, SIGNED_BER] {
            for trailer in [&b"\x05\x00"[..], &b"\x00"[..], &b"garbage"[..]] {
                let mut data = input.to_vec();
                data.extend_from_slice(trailer);

                assert!(SignedData::decode_ber(&data).is_err());
            }
        }
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Provisioning profile access.

use {
    crate::{
        asn1::{SignedData, SignerInfo, OID_ID_DATA},
        verify, MobileProvisionError,
    },
    bcder::{encode::Values, Mode, Oid},
    log::{debug, info, warn},
    std::{
        io::{Read, Write},
        path::{Path, PathBuf},
    },
    x509_certificate::CapturedX509Certificate,
};

/// File name of the provisioning profile inside an application bundle.
pub const EMBEDDED_PROFILE_FILENAME: &str = "embedded.mobileprovision";

/// A parsed Apple provisioning profile.
///
/// Provisioning profiles are CMS `SignedData` structures encapsulating a
/// property list. Instances own the decoded structure and the certificates
/// embedded in it. Once constructed, an instance is immutable.
///
/// Loading a profile does not verify its signatures. Call
/// [Self::verify_signatures] for that.
#[derive(Clone, Debug)]
pub struct ProvisioningProfile {
    signed_data: SignedData,
    certificates: Vec<CapturedX509Certificate>,
}

impl ProvisioningProfile {
    /// Construct an instance by parsing BER or DER encoded bytes.
    ///
    /// The data must be a complete `ContentInfo` holding `SignedData`.
    pub fn from_der(data: &[u8]) -> Result<Self, MobileProvisionError> {
        let signed_data = SignedData::decode_ber(data)?;
        debug!("decoded SignedData from {} bytes", data.len());

        let certificates = signed_data
            .certificates
            .iter()
            .flatten()
            .filter_map(|captured| {
                let data = captured.as_slice();

                match CapturedX509Certificate::from_der(data.to_vec())
                    .or_else(|_| CapturedX509Certificate::from_ber(data.to_vec()))
                {
                    Ok(cert) => Some(cert),
                    Err(err) => {
                        warn!("ignoring unparseable certificate: {}", err);
                        None
                    }
                }
            })
            .collect::<Vec<_>>();

        Ok(Self {
            signed_data,
            certificates,
        })
    }

    /// Construct an instance from a reader, consuming it to its end.
    pub fn from_reader(mut reader: impl Read) -> Result<Self, MobileProvisionError> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;

        Self::from_der(&data)
    }

    /// Construct an instance from the content of a file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, MobileProvisionError> {
        let path = path.as_ref();
        debug!("reading provisioning profile from {}", path.display());

        let data = std::fs::read(path)?;

        Self::from_der(&data)
    }

    /// Obtain the decoded `SignedData` structure.
    pub fn signed_data(&self) -> &SignedData {
        &self.signed_data
    }

    /// The type of the encapsulated content.
    pub fn content_type(&self) -> &Oid {
        &self.signed_data.content_info.content_type
    }

    /// Obtain the encapsulated content.
    ///
    /// For a well-formed profile this is the property list describing it.
    /// An error is returned if the content type isn't `id-data` or if there
    /// is no encapsulated content.
    pub fn content(&self) -> Result<&[u8], MobileProvisionError> {
        let content_info = &self.signed_data.content_info;

        if content_info.content_type != OID_ID_DATA {
            return Err(MobileProvisionError::ContentTypeNotData(
                content_info.content_type.clone(),
            ));
        }

        content_info
            .content
            .as_deref()
            .ok_or(MobileProvisionError::ContentAbsent)
    }

    /// Certificates embedded in the profile.
    ///
    /// Certificates that failed to parse are not included.
    pub fn certificates(&self) -> impl Iterator<Item = &CapturedX509Certificate> {
        self.certificates.iter()
    }

    /// Signers of the profile.
    pub fn signers(&self) -> impl Iterator<Item = &SignerInfo> {
        self.signed_data.signer_infos.iter()
    }

    /// Resolve the embedded certificate of a signer.
    pub fn signer_certificate(
        &self,
        signer: &SignerInfo,
    ) -> Result<&CapturedX509Certificate, MobileProvisionError> {
        verify::find_signer_certificate(signer, self.certificates())
    }

    /// Verify the signatures of all signers over the encapsulated content.
    ///
    /// This only checks cryptographic integrity. See [crate::verify] for
    /// what is not checked.
    pub fn verify_signatures(&self) -> Result<(), MobileProvisionError> {
        let content = self
            .signed_data
            .content_info
            .content
            .as_deref()
            .ok_or(MobileProvisionError::ContentAbsent)?;

        self.verify_signatures_with_content(content)
    }

    /// Verify the signatures of all signers over externally provided content.
    ///
    /// This is how detached signatures are verified.
    pub fn verify_signatures_with_content(
        &self,
        content: &[u8],
    ) -> Result<(), MobileProvisionError> {
        if self.signed_data.signer_infos.is_empty() {
            return Err(MobileProvisionError::NoSigners);
        }

        for signer in self.signers() {
            verify::verify_content_type(signer, self.content_type())?;
            let cert = self.signer_certificate(signer)?;
            verify::verify_signer(signer, cert, content)?;
        }

        Ok(())
    }

    /// Serialize the profile to a writer.
    ///
    /// Certificates, CRLs and signer infos are written exactly as they were
    /// read. The surrounding structure uses definite lengths, so DER input
    /// is reproduced verbatim.
    pub fn write_to(&self, writer: &mut impl Write) -> Result<(), MobileProvisionError> {
        self.signed_data
            .encode_ref()
            .write_encoded(Mode::Ber, writer)
            .map_err(MobileProvisionError::Encode)
    }

    /// Serialize the profile to bytes.
    pub fn encode(&self) -> Result<Vec<u8>, MobileProvisionError> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        debug!("encoded SignedData to {} bytes", buffer.len());

        Ok(buffer)
    }

    /// Write the profile into an application bundle directory.
    ///
    /// An existing `embedded.mobileprovision` is replaced. Returns the path
    /// of the written file.
    pub fn write_embedded(
        &self,
        bundle_dir: impl AsRef<Path>,
    ) -> Result<PathBuf, MobileProvisionError> {
        let path = bundle_dir.as_ref().join(EMBEDDED_PROFILE_FILENAME);
        let data = self.encode()?;

        info!("writing {}", path.display());
        std::fs::write(&path, data)?;

        Ok(path)
    }
}

#[cfg(test)]
mod test {
    use {super::*, crate::asn1::OID_ID_SIGNED_DATA};

    const HELLO: &[u8] = include_bytes!("testdata/hello.der");
    const SIGNED_DER: &[u8] = include_bytes!("testdata/signed.mobileprovision");
    const SIGNED_BER: &[u8] = include_bytes!("testdata/signed-ber.mobileprovision");
    const DETACHED: &[u8] = include_bytes!("testdata/detached.p7s");
    const OTHER_CONTENT_TYPE: &[u8] = include_bytes!("testdata/other-content-type.p7s");
    const PROFILE_PLIST: &[u8] = include_bytes!("testdata/profile.plist");

    /// The signed fixture with its message-digest value retagged as an INTEGER.
    fn malformed_message_digest() -> Vec<u8> {
        let needle = b"\x06\x09\x2a\x86\x48\x86\xf7\x0d\x01\x09\x04";
        let offset = SIGNED_DER
            .windows(needle.len())
            .position(|window| window == needle)
            .unwrap();

        let mut data = SIGNED_DER.to_vec();
        assert_eq!(data[offset + 13], 0x04);
        data[offset + 13] = 0x02;

        data
    }

    fn assert_equivalent(a: &ProvisioningProfile, b: &ProvisioningProfile) {
        assert_eq!(a.content_type(), b.content_type());
        assert_eq!(
            a.signed_data().content_info.content,
            b.signed_data().content_info.content
        );
        assert_eq!(
            a.certificates()
                .map(|cert| cert.constructed_data())
                .collect::<Vec<_>>(),
            b.certificates()
                .map(|cert| cert.constructed_data())
                .collect::<Vec<_>>()
        );
        assert_eq!(
            a.signers().map(|signer| signer.raw()).collect::<Vec<_>>(),
            b.signers().map(|signer| signer.raw()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn hello_content() {
        let profile = ProvisioningProfile::from_der(HELLO).unwrap();

        assert_eq!(profile.content().unwrap(), b"hello");
        assert_eq!(profile.certificates().count(), 0);
        assert_eq!(profile.signers().count(), 0);
        assert_eq!(profile.encode().unwrap(), HELLO);
    }

    #[test]
    fn signed_der() {
        let profile = ProvisioningProfile::from_der(SIGNED_DER).unwrap();

        assert_eq!(profile.content().unwrap(), PROFILE_PLIST);
        assert_eq!(profile.certificates().count(), 1);
        assert_eq!(profile.signers().count(), 1);

        let signer = profile.signers().next().unwrap();
        let cert = profile.signer_certificate(signer).unwrap();
        assert_eq!(
            cert.subject_common_name().as_deref(),
            Some("Example Profile Signing")
        );

        assert_eq!(profile.encode().unwrap(), SIGNED_DER);
    }

    #[test]
    fn signed_ber() {
        let profile = ProvisioningProfile::from_der(SIGNED_BER).unwrap();
        assert_eq!(profile.content().unwrap(), PROFILE_PLIST);

        let encoded = profile.encode().unwrap();
        let reparsed = ProvisioningProfile::from_der(&encoded).unwrap();
        assert_equivalent(&profile, &reparsed);

        // The normalized form is stable.
        assert_eq!(reparsed.encode().unwrap(), encoded);
        reparsed.verify_signatures().unwrap();
    }

    #[test]
    fn round_trip() {
        for data in [HELLO, SIGNED_DER, SIGNED_BER, DETACHED, OTHER_CONTENT_TYPE] {
            let profile = ProvisioningProfile::from_der(data).unwrap();
            let reparsed = ProvisioningProfile::from_der(&profile.encode().unwrap()).unwrap();

            assert_equivalent(&profile, &reparsed);
        }
    }

    #[test]
    fn write_to_writer() {
        let profile = ProvisioningProfile::from_der(SIGNED_DER).unwrap();

        let mut buffer = Vec::new();
        profile.write_to(&mut buffer).unwrap();
        assert_eq!(buffer, SIGNED_DER);
    }

    #[test]
    fn malformed_input() {
        for data in [
            &b""[..],
            &b"\x30"[..],
            &b"\x04\x05hello"[..],
            &b"not a provisioning profile"[..],
            &SIGNED_DER[0..SIGNED_DER.len() / 2],
            &SIGNED_DER[0..SIGNED_DER.len() - 1],
        ] {
            assert!(matches!(
                ProvisioningProfile::from_der(data),
                Err(MobileProvisionError::Decode(_))
            ));
        }
    }

    #[test]
    fn content_type_not_data() {
        let profile = ProvisioningProfile::from_der(OTHER_CONTENT_TYPE).unwrap();

        assert_ne!(profile.content_type(), &OID_ID_DATA);
        assert_ne!(profile.content_type(), &OID_ID_SIGNED_DATA);
        assert!(matches!(
            profile.content(),
            Err(MobileProvisionError::ContentTypeNotData(_))
        ));
    }

    #[test]
    fn detached_content() {
        let profile = ProvisioningProfile::from_der(DETACHED).unwrap();

        assert!(matches!(
            profile.content(),
            Err(MobileProvisionError::ContentAbsent)
        ));
        assert!(matches!(
            profile.verify_signatures(),
            Err(MobileProvisionError::ContentAbsent)
        ));

        profile.verify_signatures_with_content(PROFILE_PLIST).unwrap();
    }

    #[test]
    fn verify_signatures() {
        ProvisioningProfile::from_der(SIGNED_DER)
            .unwrap()
            .verify_signatures()
            .unwrap();
        ProvisioningProfile::from_der(SIGNED_BER)
            .unwrap()
            .verify_signatures()
            .unwrap();
    }

    #[test]
    fn verify_tampered() {
        let needle = b"Example Application";
        let offset = SIGNED_DER
            .windows(needle.len())
            .position(|window| window == needle)
            .unwrap();

        let mut data = SIGNED_DER.to_vec();
        data[offset] = b'e';

        let profile = ProvisioningProfile::from_der(&data).unwrap();
        assert!(matches!(
            profile.verify_signatures(),
            Err(MobileProvisionError::DigestNotEqual)
        ));
    }

    #[test]
    fn reject_trailing_data() {
        for trailer in [&b"\x05\x00"[..], &b"garbage"[..]] {
            let mut data = SIGNED_DER.to_vec();
            data.extend_from_slice(trailer);

            assert!(matches!(
                ProvisioningProfile::from_der(&data),
                Err(MobileProvisionError::Decode(_))
            ));
        }
    }

    #[test]
    fn verify_content_type_mismatch() {
        // Turn the id-data value of the content-type attribute into id-signedData.
        let needle = b"\x06\x09\x2a\x86\x48\x86\xf7\x0d\x01\x09\x03";
        let offset = SIGNED_DER
            .windows(needle.len())
            .position(|window| window == needle)
            .unwrap();

        let mut data = SIGNED_DER.to_vec();
        assert_eq!(data[offset + 23], 0x01);
        data[offset + 23] = 0x02;

        let profile = ProvisioningProfile::from_der(&data).unwrap();
        assert!(matches!(
            profile.verify_signatures(),
            Err(MobileProvisionError::ContentTypeAttributeMismatch(_))
        ));
    }

    #[test]
    fn verify_malformed_message_digest() {
        let profile = ProvisioningProfile::from_der(&malformed_message_digest()).unwrap();

        assert!(matches!(
            profile.verify_signatures(),
            Err(MobileProvisionError::MalformedSignedAttributeMessageDigest)
        ));
    }

    #[test]
    fn verify_no_signers() {
        let profile = ProvisioningProfile::from_der(HELLO).unwrap();

        assert!(matches!(
            profile.verify_signatures(),
            Err(MobileProvisionError::NoSigners)
        ));
    }

    #[test]
    fn from_path() -> Result<(), MobileProvisionError> {
        let temp_dir = tempfile::tempdir()?;

        let missing = temp_dir.path().join("missing.mobileprovision");
        assert!(matches!(
            ProvisioningProfile::from_path(&missing),
            Err(MobileProvisionError::Io(_))
        ));

        let path = temp_dir.path().join("profile.mobileprovision");
        std::fs::write(&path, SIGNED_DER)?;

        let from_path = ProvisioningProfile::from_path(&path)?;
        let from_der = ProvisioningProfile::from_der(SIGNED_DER)?;
        assert_equivalent(&from_path, &from_der);

        std::fs::write(&path, b"garbage")?;
        assert!(matches!(
            ProvisioningProfile::from_path(&path),
            Err(MobileProvisionError::Decode(_))
        ));

        Ok(())
    }

    #[test]
    fn from_reader() -> Result<(), MobileProvisionError> {
        let profile = ProvisioningProfile::from_reader(std::io::Cursor::new(SIGNED_BER))?;
        assert_eq!(profile.content()?, PROFILE_PLIST);

        Ok(())
    }

    #[test]
    fn write_embedded() -> Result<(), MobileProvisionError> {
        let temp_dir = tempfile::tempdir()?;
        let bundle = temp_dir.path().join("Example.app");
        std::fs::create_dir(&bundle)?;

        let profile = ProvisioningProfile::from_der(SIGNED_BER)?;

        // Existing profiles are replaced.
        std::fs::write(bundle.join(EMBEDDED_PROFILE_FILENAME), b"stale")?;

        let path = profile.write_embedded(&bundle)?;
        assert_eq!(path, bundle.join(EMBEDDED_PROFILE_FILENAME));
        assert_eq!(std::fs::read(&path)?, profile.encode()?);

        assert!(matches!(
            profile.write_embedded(temp_dir.path().join("missing.app")),
            Err(MobileProvisionError::Io(_))
        ));

        Ok(())
    }
}

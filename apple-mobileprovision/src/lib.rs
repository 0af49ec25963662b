// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Apple provisioning profiles in pure Rust.
//!
//! A provisioning profile (usually a `.mobileprovision` file, installed as
//! `embedded.mobileprovision` inside application bundles) is an RFC 5652
//! Cryptographic Message Syntax (CMS) `SignedData` structure wrapping a
//! property list. The property list describes which devices, entitlements,
//! and certificates an application may be run and signed with.
//!
//! This crate can:
//!
//! * Parse BER and DER encoded profiles. (See [ProvisioningProfile].)
//! * Expose the embedded property list as raw bytes. (See
//!   [ProvisioningProfile::content].)
//! * Serialize profiles back to bytes. Certificates and signer infos are
//!   preserved exactly as read, so DER profiles round-trip byte for byte.
//! * Verify the cryptographic signatures inside a profile. (See [verify].)
//! * Install a profile into an application bundle. (See
//!   [ProvisioningProfile::write_embedded].)
//!
//! Things this crate deliberately does not do:
//!
//! * Parse the property list. Feed [ProvisioningProfile::content] into a
//!   plist parser of your choosing.
//! * Validate certificate chains or revocation status. Signature verification
//!   only proves the content was signed by the embedded certificate, not that
//!   the certificate should be trusted.
//!
//! ASN.1 handling is provided by the `bcder` crate. X.509 certificate
//! parsing and cryptographic primitives come from `x509-certificate`.

pub mod asn1;
mod error;
pub use error::*;
mod profile;
pub use profile::*;
pub mod reader;
pub mod verify;

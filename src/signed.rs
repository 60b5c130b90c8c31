//! Unwrapping of S/MIME signed payloads (`smime.p7m` attachments).
//!
//! A signed message stores one PKCS#7 envelope holding the original MIME
//! message plus signatures and certificates. This module checks the
//! signature against the certificates the envelope itself carries (chain
//! of trust is explicitly not validated) and hands the enclosed MIME
//! bytes back as an opaque payload.

use openssl::pkcs7::{Pkcs7, Pkcs7Flags};
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::X509;

use crate::error::{MsgError, Result};

/// Result of unwrapping a signed envelope. A failed signature is data,
/// not an error: the content is still extracted.
#[derive(Clone, Debug)]
pub struct UnwrappedContent {
    pub signature_valid: bool,
    pub content: Vec<u8>,
}

/// Parses the signed envelope and verifies its signature. Fails with
/// `CorruptData` only when the envelope itself cannot be parsed.
pub fn unwrap(signed_bytes: &[u8]) -> Result<UnwrappedContent> {
    let pkcs7 = Pkcs7::from_der(signed_bytes)
        .map_err(|err| MsgError::CorruptData(format!("signed envelope is not PKCS#7: {err}")))?;

    let certs: Stack<X509> = Stack::new()
        .map_err(|err| MsgError::CorruptData(format!("openssl stack: {err}")))?;
    let store = X509StoreBuilder::new()
        .map_err(|err| MsgError::CorruptData(format!("openssl store: {err}")))?
        .build();

    // NOVERIFY skips chain validation but still checks the signatures
    // against the embedded certificates.
    let mut content = Vec::new();
    match pkcs7.verify(
        &certs,
        &store,
        None,
        Some(&mut content),
        Pkcs7Flags::NOVERIFY,
    ) {
        Ok(()) => Ok(UnwrappedContent {
            signature_valid: true,
            content,
        }),
        Err(err) => {
            log::debug!("signature verification failed: {err}");
            // Extract the content anyway, with signature checks disabled.
            let mut content = Vec::new();
            let extracted = pkcs7.verify(
                &certs,
                &store,
                None,
                Some(&mut content),
                Pkcs7Flags::NOVERIFY | Pkcs7Flags::NOSIGS,
            );
            if extracted.is_err() {
                content.clear();
            }
            Ok(UnwrappedContent {
                signature_valid: false,
                content,
            })
        }
    }
}

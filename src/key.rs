use der::Encode;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey, LineEnding};
use rsa::pkcs1v15::SigningKey as RsaSigningKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use sha2::Sha256;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::error::{PkiError, Result};

/// RSA modulus sizes accepted for generated keys.
pub const SUPPORTED_RSA_KEY_SIZES: [usize; 3] = [2048, 3072, 4096];

/// An RSA key pair used to sign certificates or handed out with a leaf.
#[derive(Clone, Debug)]
pub struct KeyPair {
    private: Box<RsaPrivateKey>,
    public: RsaPublicKey,
}

impl KeyPair {
    /// Generate an RSA key pair with the specified number of bits.
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        if !SUPPORTED_RSA_KEY_SIZES.contains(&bits) {
            return Err(PkiError::InvalidInput(format!(
                "unsupported RSA key size {bits}"
            )));
        }
        let mut rng = rand_core::OsRng;
        let private = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| PkiError::KeyGenerationError(e.to_string()))?;
        let public = RsaPublicKey::from(&private);
        Ok(KeyPair {
            private: Box::new(private),
            public,
        })
    }

    /// Parse a PKCS#1 `RSA PRIVATE KEY` PEM block.
    pub fn from_pkcs1_pem(pem: &str) -> Result<Self> {
        let private = RsaPrivateKey::from_pkcs1_pem(pem)?;
        let public = RsaPublicKey::from(&private);
        Ok(KeyPair {
            private: Box::new(private),
            public,
        })
    }

    /// Encode the private key as a PKCS#1 PEM block.
    pub fn to_pkcs1_pem(&self) -> Result<String> {
        let pem = self.private.to_pkcs1_pem(LineEnding::LF)?;
        Ok(pem.to_string())
    }

    /// Modulus size in bits.
    pub fn key_size(&self) -> usize {
        self.public.size() * 8
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::Rsa(self.public.clone())
    }

    /// Sign `data` with RSASSA-PKCS1-v1_5 over SHA-256.
    pub fn sign_data(&self, data: &[u8]) -> Result<Vec<u8>> {
        let signing_key: RsaSigningKey<Sha256> = RsaSigningKey::new((*self.private).clone());
        let signature = signing_key
            .try_sign(data)
            .map_err(|e| PkiError::CertificateError(format!("signing failed: {e}")))?;
        Ok(signature.to_vec())
    }
}

/// The public half of a [`KeyPair`], as embedded in a certificate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
}

impl PublicKey {
    /// Decode the public key carried in a certificate.
    pub fn from_x509spki(spki: &SubjectPublicKeyInfoOwned) -> Result<Self> {
        let der = spki.to_der()?;
        let public = RsaPublicKey::from_public_key_der(&der)
            .map_err(|e| PkiError::DecodingError(format!("unsupported public key: {e}")))?;
        Ok(PublicKey::Rsa(public))
    }

    pub fn to_x509spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        match self {
            PublicKey::Rsa(public) => SubjectPublicKeyInfoOwned::from_key(public.clone())
                .map_err(|e| PkiError::EncodingError(e.to_string())),
        }
    }

    /// RFC 5280 method 1 key identifier: SHA-1 of the subjectPublicKey bits.
    pub fn key_identifier(&self) -> Result<Vec<u8>> {
        let spki = self.to_x509spki()?;
        let digest = <Sha1 as sha1::Digest>::digest(spki.subject_public_key.raw_bytes());
        Ok(digest.to_vec())
    }

    pub fn key_size(&self) -> usize {
        match self {
            PublicKey::Rsa(public) => public.size() * 8,
        }
    }
}

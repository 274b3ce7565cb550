use std::fmt;

/// Signing algorithms the key generator is asked for, by DNSSEC algorithm
/// number (RFC 8624 table)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum KeyAlgorithm {
    /// RSA/SHA-1 (RFC 3110)
    RsaSha1 = 5,
    /// RSASHA1-NSEC3-SHA1 (RFC 5155)
    RsaSha1Nsec3Sha1 = 7,
    /// RSA/SHA-256 (RFC 5702)
    RsaSha256 = 8,
    /// RSA/SHA-512 (RFC 5702)
    RsaSha512 = 10,
    /// ECDSA Curve P-256 with SHA-256 (RFC 6605)
    EcdsaP256Sha256 = 13,
    /// ECDSA Curve P-384 with SHA-384 (RFC 6605)
    EcdsaP384Sha384 = 14,
    /// Ed25519 (RFC 8080)
    Ed25519 = 15,
    /// Ed448 (RFC 8080)
    Ed448 = 16,
}

impl KeyAlgorithm {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            5 => Some(Self::RsaSha1),
            7 => Some(Self::RsaSha1Nsec3Sha1),
            8 => Some(Self::RsaSha256),
            10 => Some(Self::RsaSha512),
            13 => Some(Self::EcdsaP256Sha256),
            14 => Some(Self::EcdsaP384Sha384),
            15 => Some(Self::Ed25519),
            16 => Some(Self::Ed448),
            _ => None,
        }
    }

    /// Parse a BIND mnemonic (`ECDSAP256SHA256`) or an algorithm number
    pub fn from_mnemonic(name: &str) -> Option<Self> {
        if let Ok(number) = name.trim().parse::<u8>() {
            return Self::from_u8(number);
        }
        match name.trim().to_ascii_uppercase().as_str() {
            "RSASHA1" => Some(Self::RsaSha1),
            "NSEC3RSASHA1" => Some(Self::RsaSha1Nsec3Sha1),
            "RSASHA256" => Some(Self::RsaSha256),
            "RSASHA512" => Some(Self::RsaSha512),
            "ECDSAP256SHA256" => Some(Self::EcdsaP256Sha256),
            "ECDSAP384SHA384" => Some(Self::EcdsaP384Sha384),
            "ED25519" => Some(Self::Ed25519),
            "ED448" => Some(Self::Ed448),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            Self::RsaSha1 => "RSASHA1",
            Self::RsaSha1Nsec3Sha1 => "NSEC3RSASHA1",
            Self::RsaSha256 => "RSASHA256",
            Self::RsaSha512 => "RSASHA512",
            Self::EcdsaP256Sha256 => "ECDSAP256SHA256",
            Self::EcdsaP384Sha384 => "ECDSAP384SHA384",
            Self::Ed25519 => "ED25519",
            Self::Ed448 => "ED448",
        }
    }

    /// RSA keys take a size; curve keys have a fixed one
    pub fn takes_key_size(&self) -> bool {
        matches!(
            self,
            Self::RsaSha1 | Self::RsaSha1Nsec3Sha1 | Self::RsaSha256 | Self::RsaSha512
        )
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mnemonics() {
        assert_eq!(
            KeyAlgorithm::from_mnemonic("ecdsap256sha256"),
            Some(KeyAlgorithm::EcdsaP256Sha256)
        );
        assert_eq!(KeyAlgorithm::from_mnemonic("8"), Some(KeyAlgorithm::RsaSha256));
        assert_eq!(KeyAlgorithm::from_mnemonic("RSAMD5"), None);
        assert_eq!(KeyAlgorithm::EcdsaP256Sha256.to_u8(), 13);
        assert!(KeyAlgorithm::RsaSha256.takes_key_size());
        assert!(!KeyAlgorithm::Ed25519.takes_key_size());
    }
}

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Calculate the key tag for a DNSKEY record (RFC 4034 Appendix B)
pub fn calculate_key_tag(flags: u16, protocol: u8, algorithm: u8, public_key: &[u8]) -> u16 {
    // RSAMD5 uses the low 16 bits of the modulus
    if algorithm == 1 {
        if public_key.len() >= 2 {
            return u16::from_be_bytes([
                public_key[public_key.len() - 2],
                public_key[public_key.len() - 1],
            ]);
        }
        return 0;
    }

    let mut accumulator: u32 = 0;
    let header = [
        (flags >> 8) as u8,
        flags as u8,
        protocol,
        algorithm,
    ];
    for (i, &byte) in header.iter().chain(public_key).enumerate() {
        if i % 2 == 0 {
            accumulator += u32::from(byte) << 8;
        } else {
            accumulator += u32::from(byte);
        }
    }

    accumulator += (accumulator >> 16) & 0xFFFF;
    (accumulator & 0xFFFF) as u16
}

/// Key tag of DNSKEY rdata in presentation form
/// (`flags protocol algorithm base64...`)
pub fn key_tag_from_rdata(rdata: &str) -> Option<u16> {
    let mut fields = rdata.split_whitespace();
    let flags = fields.next()?.parse().ok()?;
    let protocol = fields.next()?.parse().ok()?;
    let algorithm = fields.next()?.parse().ok()?;
    let key: String = fields.collect();
    let public_key = STANDARD.decode(key).ok()?;
    Some(calculate_key_tag(flags, protocol, algorithm, &public_key))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// DNSKEY from RFC 4034 section 5.4
    const RFC_DNSKEY: &str = "256 3 5 AQOeiiR0GOMYkDshWoSKz9XzfwJr1AYtsmx3TGkJaNXVbfi/2pHm822aJ5iI9BMzNXxeYCmZDRD99WYwYqUSdjMmmAphXdvxegXd/M5+X7OrzKBaMbCVdFLUUh6DhweJBjEVv5f2wwjM9XzcnOf+EPbtG9DMBmADjFDc2w/rljwvFw==";

    #[test]
    fn test_key_tag_rfc_example() {
        assert_eq!(key_tag_from_rdata(RFC_DNSKEY), Some(60485));
    }

    #[test]
    fn test_key_tag_rsamd5() {
        let key_tag = calculate_key_tag(0x0101, 3, 1, &[0x12, 0x34, 0x56, 0x78]);
        assert_eq!(key_tag, 0x5678);
    }

    #[test]
    fn test_key_tag_bad_rdata() {
        assert_eq!(key_tag_from_rdata("257 3"), None);
        assert_eq!(key_tag_from_rdata("257 3 13 !!!"), None);
    }
}

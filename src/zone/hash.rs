//! Change-detection hash written into zone file headers.

const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// `base36(crc32(data))`
pub fn content_hash(data: &[u8]) -> String {
    to_base36(crc32fast::hash(data))
}

/// Lowercase base-36 rendering of an unsigned value
pub fn to_base36(mut value: u32) -> String {
    if value == 0 {
        return "0".to_string();
    }

    let mut digits = Vec::with_capacity(7);
    while value > 0 {
        digits.push(BASE36_DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();

    // Only ASCII digits were pushed
    digits.into_iter().map(char::from).collect()
}

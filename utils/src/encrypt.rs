/// MD5 in lowercase hex, used for stable and compact request fingerprints.
pub fn md5_hex(data: &[u8]) -> String {
    format!("{:x}", md5::compute(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_md5_hex() {
        assert_eq!(md5_hex(b"abc"), "900150983cd24fb0d6963f7d28e17f72");
        assert_eq!(md5_hex(b""), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_md5_hex_stable() {
        assert_eq!(md5_hex(b"https://example.com"), md5_hex(b"https://example.com"));
        assert_ne!(md5_hex(b"https://example.com/a"), md5_hex(b"https://example.com/b"));
    }
}

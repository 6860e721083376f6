use core::fmt;

use heapless::String;

use crate::error::FsError;

const BASE_LEN: usize = 8;
const NAME_LEN: usize = 11;
const ILLEGAL: &[u8] = b"|<>^+=?/[];,*\"\\";

/// A blank-padded 8.3 name exactly as stored in a directory record.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShortName([u8; NAME_LEN]);

impl ShortName {
    pub const DOT: Self = Self(*b".          ");
    pub const DOTDOT: Self = Self(*b"..         ");

    /// Encodes one path segment. Letters are uppercased; at most one `.`
    /// splits a base of 1..=8 bytes from an extension of up to 3.
    pub fn encode(segment: &[u8]) -> Result<Self, FsError> {
        let mut out = [b' '; NAME_LEN];
        let mut limit = BASE_LEN;
        let mut at = 0;
        for &byte in segment {
            if byte == b'.' {
                if limit == NAME_LEN {
                    return Err(FsError::NameInvalid);
                }
                limit = NAME_LEN;
                at = BASE_LEN;
                continue;
            }
            if ILLEGAL.contains(&byte) || !(0x21..=0x7E).contains(&byte) || at >= limit {
                return Err(FsError::NameInvalid);
            }
            out[at] = byte.to_ascii_uppercase();
            at += 1;
        }
        if out[0] == b' ' {
            return Err(FsError::NameInvalid);
        }
        Ok(Self(out))
    }

    pub const fn from_raw(raw: [u8; NAME_LEN]) -> Self {
        Self(raw)
    }

    pub const fn as_bytes(&self) -> &[u8; NAME_LEN] {
        &self.0
    }

    /// Display form: padding dropped, `.` reinserted before a non-empty
    /// extension.
    pub fn decode(&self) -> String<12> {
        let mut out = String::new();
        for (i, &byte) in self.0.iter().enumerate() {
            if byte == b' ' {
                continue;
            }
            if i == BASE_LEN {
                let _ = out.push('.');
            }
            let _ = out.push(char::from(byte));
        }
        out
    }
}

impl fmt::Debug for ShortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShortName({:?})", self.decode().as_str())
    }
}

impl fmt::Display for ShortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.decode().as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(text: &str) -> [u8; 11] {
        *ShortName::encode(text.as_bytes()).unwrap().as_bytes()
    }

    #[test]
    fn encodes_base_and_extension_blank_padded() {
        assert_eq!(&encoded("log.txt"), b"LOG     TXT");
        assert_eq!(&encoded("DATA0001.BIN"), b"DATA0001BIN");
        assert_eq!(&encoded("readme"), b"README     ");
        assert_eq!(&encoded("a.b"), b"A       B  ");
    }

    #[test]
    fn decode_restores_canonical_form() {
        for (input, canonical) in [
            ("log.txt", "LOG.TXT"),
            ("Flight01.Bin", "FLIGHT01.BIN"),
            ("readme", "README"),
            ("x.", "X"),
            ("~$1.a", "~$1.A"),
        ] {
            let name = ShortName::encode(input.as_bytes()).unwrap();
            assert_eq!(name.decode().as_str(), canonical, "input {}", input);
        }
    }

    #[test]
    fn rejects_overlong_parts_and_extra_dots() {
        for bad in ["toolongname.txt", "file.text", "a.b.c", ".txt", "", "."] {
            assert_eq!(
                ShortName::encode(bad.as_bytes()),
                Err(FsError::NameInvalid),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn rejects_reserved_and_non_printable_bytes() {
        let samples: [&[u8]; 9] = [
            b"a|b", b"a<b", b"q?", b"x*", b"a b", b"tab\t", b"\x7f", b"back\\", b"caf\xc3\xa9",
        ];
        for bad in samples {
            assert_eq!(ShortName::encode(bad), Err(FsError::NameInvalid));
        }
    }

    #[test]
    fn dot_entries_display_as_dots() {
        assert_eq!(ShortName::DOT.decode().as_str(), ".");
        assert_eq!(ShortName::DOTDOT.decode().as_str(), "..");
    }
}

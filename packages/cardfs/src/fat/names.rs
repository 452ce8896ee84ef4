use core::fmt::{self, Write as _};

const BASE_LEN: usize = 8;
const EXT_LEN: usize = 3;
const NAME_LEN: usize = BASE_LEN + EXT_LEN;

/// A space-padded, upper-case 8.3 name exactly as stored on disk.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShortName([u8; NAME_LEN]);

impl ShortName {
    pub const DOT: Self = Self(*b".          ");
    pub const DOTDOT: Self = Self(*b"..         ");

    /// Normalizes a user name. Never fails: unusable characters become `_`,
    /// overlong parts are cut.
    pub fn new(name: &str) -> Self {
        match name {
            "." => return Self::DOT,
            ".." => return Self::DOTDOT,
            _ => {}
        }

        let (base, ext) = match name.char_indices().find(|&(idx, ch)| ch == '.' && idx > 0) {
            Some((idx, _)) => (&name[..idx], &name[idx + 1..]),
            None => (name, ""),
        };

        let mut raw = [b' '; NAME_LEN];
        for (slot, ch) in raw[..BASE_LEN].iter_mut().zip(base.chars()) {
            *slot = map_char(ch, true);
        }
        for (slot, ch) in raw[BASE_LEN..].iter_mut().zip(ext.chars()) {
            *slot = map_char(ch, false);
        }
        Self(raw)
    }

    pub const fn from_raw(raw: [u8; NAME_LEN]) -> Self {
        Self(raw)
    }

    pub fn as_bytes(&self) -> &[u8; NAME_LEN] {
        &self.0
    }

    /// A name whose first byte is padding cannot be stored.
    pub fn is_blank(&self) -> bool {
        self.0[0] == b' '
    }

    /// Value of the leading decimal digits of the base, if it starts with one.
    pub fn leading_number(&self) -> Option<u32> {
        let digits = self.0[..BASE_LEN]
            .iter()
            .take_while(|byte| byte.is_ascii_digit());
        let mut value = None;
        for &digit in digits {
            value = Some(value.unwrap_or(0u32) * 10 + u32::from(digit - b'0'));
        }
        value
    }

    fn base(&self) -> &[u8] {
        trim_padding(&self.0[..BASE_LEN])
    }

    fn ext(&self) -> &[u8] {
        trim_padding(&self.0[BASE_LEN..])
    }
}

fn map_char(ch: char, in_base: bool) -> u8 {
    if ch.is_ascii_alphanumeric() {
        ch.to_ascii_uppercase() as u8
    } else if ch == '~' || (in_base && ch == '.') {
        ch as u8
    } else {
        b'_'
    }
}

fn trim_padding(part: &[u8]) -> &[u8] {
    let len = part
        .iter()
        .rposition(|&byte| byte != b' ')
        .map_or(0, |idx| idx + 1);
    &part[..len]
}

impl fmt::Display for ShortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &byte in self.base() {
            f.write_char(char::from(byte))?;
        }
        let ext = self.ext();
        if !ext.is_empty() {
            f.write_char('.')?;
            for &byte in ext {
                f.write_char(char::from(byte))?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ShortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ShortName(\"")?;
        for &byte in &self.0 {
            f.write_char(char::from(byte))?;
        }
        f.write_str("\")")
    }
}

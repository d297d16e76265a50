//! Identity types for ISL connectors and sessions
//!
//! A connector is identified by a braced uuid string. Its numeric uid is a
//! 32-bit digest of that string, used as the registry key. Zero is reserved
//! to mark a free registry slot.

use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{IslError, IslResult};

/// Generate a random (version 4) uuid in its braced text form
pub fn generate_uuid() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    format!(
        "{{{}-{}-{}-{}-{}}}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

/// Numeric connector identity - digest of the uuid string
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ConnectorUid(pub u32);

impl ConnectorUid {
    pub const ZERO: ConnectorUid = ConnectorUid(0);

    #[inline]
    pub fn new(id: u32) -> Self {
        ConnectorUid(id)
    }

    /// Derive the uid from a connector id string
    pub fn from_id(id: &str) -> Self {
        let digest = Sha256::digest(id.as_bytes());
        let uid = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]);
        // Zero marks a free slot in the simulations table
        ConnectorUid(uid.max(1))
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for ConnectorUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uid({:08x})", self.0)
    }
}

impl fmt::Display for ConnectorUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// Model type tag - up to four ASCII chars packed little-endian
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TypeTag(pub u32);

impl TypeTag {
    /// Default tag for connectors created through the API
    pub const ISL: TypeTag = TypeTag(u32::from_le_bytes([b'I', b'S', b'L', 0]));

    pub fn from_str_tag(s: &str) -> Self {
        let mut packed = 0u32;
        for (i, b) in s.bytes().take(4).enumerate() {
            packed |= (b as u32) << (8 * i);
        }
        TypeTag(packed)
    }

    pub fn as_string(self) -> String {
        let mut out = String::new();
        let mut v = self.0;
        while v != 0 {
            out.push((v & 0xff) as u8 as char);
            v >>= 8;
        }
        out
    }

    #[inline]
    pub fn is_unset(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({})", self.as_string())
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

/// Whether `s` is an identifier: a letter or `_`, then letters, digits or `_`
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Session identity - shared synchronization scope
#[derive(Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Validate and wrap a session identifier
    pub fn parse(s: &str) -> IslResult<Self> {
        if !is_identifier(s) {
            return Err(IslError::InvalidSessionId(s.to_string()));
        }
        Ok(SessionId(s.to_string()))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Session({})", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

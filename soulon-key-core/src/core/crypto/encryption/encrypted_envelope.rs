use crate::shared::constants::*;
use crate::shared::error::SecurityError;
use crate::shared::types::SecurityResult;
use crate::shared::utils::current_timestamp_millis;
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// AES-256-GCM output plus its creation time
///
/// Wire layout, all integers big-endian:
/// `[u32 iv_len][iv][u32 ct_len][ciphertext || tag][i64 epoch_millis]`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncryptedEnvelope {
    iv: Vec<u8>,
    ciphertext: Vec<u8>,
    timestamp: i64,
}

impl EncryptedEnvelope {
    /// Build an envelope, checking IV and tag sizes
    pub fn new(iv: Vec<u8>, ciphertext: Vec<u8>, timestamp: i64) -> SecurityResult<Self> {
        if iv.len() != IV_SIZE {
            return Err(SecurityError::invalid_input(format!(
                "IV must be {} bytes, got {}",
                IV_SIZE,
                iv.len()
            )));
        }
        if ciphertext.len() < TAG_SIZE {
            return Err(SecurityError::invalid_input(format!(
                "Ciphertext must include a {}-byte tag",
                TAG_SIZE
            )));
        }
        Ok(Self { iv, ciphertext, timestamp })
    }

    /// Envelope stamped with the current time
    pub fn sealed_now(iv: Vec<u8>, ciphertext: Vec<u8>) -> SecurityResult<Self> {
        Self::new(iv, ciphertext, current_timestamp_millis())
    }

    pub fn iv(&self) -> &[u8] {
        &self.iv
    }

    /// Ciphertext with the 16-byte tag appended
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Milliseconds since the Unix epoch at encryption time
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn serialized_len(&self) -> usize {
        LENGTH_PREFIX_SIZE * 2 + self.iv.len() + self.ciphertext.len() + TIMESTAMP_SIZE
    }

    pub fn serialize(&self) -> SecurityResult<Vec<u8>> {
        let iv_len = u32::try_from(self.iv.len())
            .map_err(|_| SecurityError::invalid_input("IV too large to serialize"))?;
        let ct_len = u32::try_from(self.ciphertext.len())
            .map_err(|_| SecurityError::invalid_input("Ciphertext too large to serialize"))?;

        let mut out = Vec::with_capacity(self.serialized_len());
        out.extend_from_slice(&iv_len.to_be_bytes());
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&ct_len.to_be_bytes());
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        Ok(out)
    }

    /// Parse the wire layout. Truncated input, lengths that run past the buffer,
    /// and trailing bytes are all `InvalidInput`.
    pub fn deserialize(bytes: &[u8]) -> SecurityResult<Self> {
        if bytes.len() < MIN_ENVELOPE_SIZE {
            return Err(SecurityError::invalid_input(format!(
                "Envelope too short: {} bytes",
                bytes.len()
            )));
        }

        let mut reader = Reader { bytes, pos: 0 };
        let iv_len = reader.read_u32()? as usize;
        let iv = reader.read_slice(iv_len)?.to_vec();
        let ct_len = reader.read_u32()? as usize;
        let ciphertext = reader.read_slice(ct_len)?.to_vec();
        let timestamp = reader.read_i64()?;

        if reader.remaining() != 0 {
            return Err(SecurityError::invalid_input(format!(
                "{} trailing bytes after envelope",
                reader.remaining()
            )));
        }

        Self::new(iv, ciphertext, timestamp)
    }

    pub fn to_base64(&self) -> SecurityResult<String> {
        Ok(STANDARD.encode(self.serialize()?))
    }

    pub fn from_base64(encoded: &str) -> SecurityResult<Self> {
        let bytes = STANDARD.decode(encoded.trim())?;
        Self::deserialize(&bytes)
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn read_slice(&mut self, len: usize) -> SecurityResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(SecurityError::invalid_input(format!(
                "Declared length {} exceeds remaining {} bytes",
                len,
                self.remaining()
            )));
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_u32(&mut self) -> SecurityResult<u32> {
        let mut buf = [0u8; LENGTH_PREFIX_SIZE];
        buf.copy_from_slice(self.read_slice(LENGTH_PREFIX_SIZE)?);
        Ok(u32::from_be_bytes(buf))
    }

    fn read_i64(&mut self) -> SecurityResult<i64> {
        let mut buf = [0u8; TIMESTAMP_SIZE];
        buf.copy_from_slice(self.read_slice(TIMESTAMP_SIZE)?);
        Ok(i64::from_be_bytes(buf))
    }
}

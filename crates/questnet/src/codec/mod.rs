mod decoder;
mod encoder;
mod record;
mod schema;

pub use record::{Record, ToRecord, Value};
pub use schema::{Element, Field, Schema, SchemaBuilder, SchemaError};

/// Longest string, array or map the single-byte length prefix can describe.
pub const MAX_LENGTH: usize = u8::MAX as usize;

/// Deployment-wide wire constants. Both ends must agree on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireConfig {
    bytes_per_char: u8,
    bytes_per_id: u8,
    boolean_bytes: u8,
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            bytes_per_char: 1,
            bytes_per_id: 2,
            boolean_bytes: 1,
        }
    }
}

impl WireConfig {
    pub fn new(bytes_per_char: u8, bytes_per_id: u8, boolean_bytes: u8) -> Result<Self, SchemaError> {
        let check = |name: &'static str, bytes: u8, max: u8| {
            if bytes == 0 || bytes > max {
                Err(SchemaError::InvalidWireWidth { name, bytes })
            } else {
                Ok(())
            }
        };
        check("bytes_per_char", bytes_per_char, 4)?;
        check("bytes_per_id", bytes_per_id, schema::MAX_WIDTH)?;
        check("boolean_bytes", boolean_bytes, schema::MAX_WIDTH)?;

        Ok(Self {
            bytes_per_char,
            bytes_per_id,
            boolean_bytes,
        })
    }

    pub fn bytes_per_char(&self) -> u8 {
        self.bytes_per_char
    }

    pub fn bytes_per_id(&self) -> u8 {
        self.bytes_per_id
    }

    pub fn boolean_bytes(&self) -> u8 {
        self.boolean_bytes
    }

    /// Largest entity id a map key can carry.
    pub fn max_id(&self) -> u64 {
        max_value(self.bytes_per_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("field `{field}`: value {value} does not fit in {bytes} bytes")]
    ValueTooWide {
        field: &'static str,
        value: u64,
        bytes: u8,
    },
    #[error("field `{field}`: length {len} exceeds the single-byte length prefix")]
    TooLong { field: &'static str, len: usize },
    #[error("field `{field}`: character {ch:?} does not fit in {bytes} bytes")]
    CharTooWide {
        field: &'static str,
        ch: char,
        bytes: u8,
    },
    #[error("field `{field}`: map key {key} does not fit in {bytes} bytes")]
    IdTooWide {
        field: &'static str,
        key: u64,
        bytes: u8,
    },
    #[error("field `{field}`: expected {expected}, found {found}")]
    TypeMismatch {
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },
    #[error("schema `{schema}`: {count} booleans exceed the {bytes}-byte value mask")]
    TooManyBooleans {
        schema: &'static str,
        count: usize,
        bytes: u8,
    },
    #[error("truncated input: needed {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("invalid character code {code:#x} at offset {offset}")]
    InvalidChar { code: u32, offset: usize },
}

/// Schema-driven encoder/decoder bound to one set of wire constants.
#[derive(Debug, Clone, Copy, Default)]
pub struct Codec {
    wire: WireConfig,
}

impl Codec {
    pub fn new(wire: WireConfig) -> Self {
        Self { wire }
    }

    pub fn wire(&self) -> &WireConfig {
        &self.wire
    }

    /// Exact number of bytes `encode` will produce for `record`.
    pub fn compute_size(&self, record: &Record, schema: &Schema) -> Result<usize, CodecError> {
        encoder::compute_size(record, schema, &self.wire)
    }

    pub fn encode(&self, record: &Record, schema: &Schema) -> Result<Vec<u8>, CodecError> {
        encoder::encode(record, schema, &self.wire)
    }

    /// Decodes one object starting at `offset` and returns it with the offset
    /// of the first byte after it.
    pub fn decode(
        &self,
        data: &[u8],
        offset: usize,
        schema: &Schema,
    ) -> Result<(Record, usize), CodecError> {
        decoder::decode(data, offset, schema, &self.wire)
    }
}

#[inline]
pub(crate) fn max_value(bytes: u8) -> u64 {
    if bytes >= 8 {
        u64::MAX
    } else {
        (1u64 << (u32::from(bytes) * 8)) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_config_limits() {
        assert!(WireConfig::new(1, 2, 1).is_ok());
        assert!(WireConfig::new(0, 2, 1).is_err());
        assert!(WireConfig::new(5, 2, 1).is_err());
        assert!(WireConfig::new(1, 9, 1).is_err());
        assert_eq!(WireConfig::default().max_id(), u64::from(u16::MAX));
    }

    #[test]
    fn max_value_per_width() {
        assert_eq!(max_value(1), 255);
        assert_eq!(max_value(3), 0xFF_FFFF);
        assert_eq!(max_value(8), u64::MAX);
    }
}

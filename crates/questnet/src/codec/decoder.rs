use std::collections::BTreeMap;

use super::{CodecError, Element, Field, Record, Schema, Value, WireConfig};

pub(super) fn decode(
    data: &[u8],
    offset: usize,
    schema: &Schema,
    wire: &WireConfig,
) -> Result<(Record, usize), CodecError> {
    let mut reader = Reader { data, offset };
    let record = read_record(&mut reader, schema, wire)?;
    Ok((record, reader.offset))
}

struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, needed: usize) -> Result<&'a [u8], CodecError> {
        let available = self.data.len().saturating_sub(self.offset);
        if needed > available || self.offset > self.data.len() {
            return Err(CodecError::Truncated {
                offset: self.offset,
                needed,
                available,
            });
        }
        let bytes = &self.data[self.offset..self.offset + needed];
        self.offset += needed;
        Ok(bytes)
    }

    fn uint(&mut self, bytes: u8) -> Result<u64, CodecError> {
        let raw = self.take(bytes as usize)?;
        Ok(raw.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
    }

    fn len(&mut self) -> Result<usize, CodecError> {
        Ok(self.uint(1)? as usize)
    }
}

fn read_record(
    reader: &mut Reader<'_>,
    schema: &Schema,
    wire: &WireConfig,
) -> Result<Record, CodecError> {
    let count = schema.count_fields();
    let nb_booleans = schema.booleans().len();
    if nb_booleans > wire.boolean_bytes() as usize * 8 {
        return Err(CodecError::TooManyBooleans {
            schema: schema.name(),
            count: nb_booleans,
            bytes: wire.boolean_bytes(),
        });
    }
    let first_boolean = count - nb_booleans;

    let mask = reader.uint(schema.properties_bytes())?;
    let mut bools = None;
    let mut record = Record::new();

    for (index, field) in schema.fields().enumerate() {
        let present = mask & Schema::mask_bit(index, count) != 0;

        // the boolean value mask follows the last standalone object whether
        // or not any boolean is present
        if matches!(field, Field::Boolean { .. }) && bools.is_none() {
            bools = Some(reader.uint(wire.boolean_bytes())?);
        }

        if !present {
            continue;
        }

        let value = match field {
            Field::Numerical { bytes, .. } => Value::Uint(reader.uint(bytes)?),
            Field::String { .. } => {
                let len = reader.len()?;
                let width = wire.bytes_per_char();
                let mut text = String::with_capacity(len);
                for _ in 0..len {
                    let offset = reader.offset;
                    let code = reader.uint(width)? as u32;
                    let ch = char::from_u32(code).ok_or(CodecError::InvalidChar { code, offset })?;
                    text.push(ch);
                }
                Value::Str(text)
            }
            Field::Array { element, .. } => {
                let len = reader.len()?;
                match element {
                    Element::Int { bytes } => {
                        let mut values = Vec::with_capacity(len);
                        for _ in 0..len {
                            values.push(reader.uint(*bytes)?);
                        }
                        Value::Ints(values)
                    }
                    Element::Object(schema) => {
                        let mut records = Vec::with_capacity(len);
                        for _ in 0..len {
                            records.push(read_record(reader, schema, wire)?);
                        }
                        Value::List(records)
                    }
                }
            }
            Field::Map { schema, .. } => {
                let len = reader.len()?;
                let mut entries = BTreeMap::new();
                for _ in 0..len {
                    let key = reader.uint(wire.bytes_per_id())?;
                    entries.insert(key, read_record(reader, schema, wire)?);
                }
                Value::Map(entries)
            }
            Field::StandAlone { schema, .. } => Value::Object(read_record(reader, schema, wire)?),
            Field::Boolean { .. } => {
                let bit = Schema::mask_bit(index - first_boolean, nb_booleans);
                Value::Bool(bools.unwrap_or_default() & bit != 0)
            }
        };
        record.insert(field.name(), value);
    }

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position() -> Schema {
        Schema::builder("position")
            .numerical("id", 2)
            .numerical("x", 1)
            .numerical("y", 1)
            .properties_bytes(1)
            .build()
            .unwrap()
    }

    #[test]
    fn decodes_and_reports_next_offset() {
        let data = [0xFF, 0b111, 0x00, 0x03, 10, 4, 0xEE];
        let (record, next) = decode(&data, 1, &position(), &WireConfig::default()).unwrap();

        assert_eq!(record.uint("id"), Some(3));
        assert_eq!(record.uint("x"), Some(10));
        assert_eq!(record.uint("y"), Some(4));
        assert_eq!(next, 6);
    }

    #[test]
    fn absent_fields_stay_absent() {
        let data = [0b010, 0];
        let (record, _) = decode(&data, 0, &position(), &WireConfig::default()).unwrap();

        assert_eq!(record.len(), 1);
        assert_eq!(record.uint("x"), Some(0));
        assert!(!record.contains("id"));
    }

    #[test]
    fn truncated_input_fails() {
        let data = [0b111, 0x00, 0x03, 10];
        let err = decode(&data, 0, &position(), &WireConfig::default()).unwrap_err();

        assert_eq!(
            err,
            CodecError::Truncated {
                offset: 4,
                needed: 1,
                available: 0
            }
        );
    }

    #[test]
    fn offset_past_end_fails() {
        let err = decode(&[0b111], 5, &position(), &WireConfig::default()).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { available: 0, .. }));
    }

    #[test]
    fn truncated_string_fails() {
        let schema = Schema::builder("named").string("name").build().unwrap();
        let data = [0b1, 5, b'a', b'b'];

        assert!(matches!(
            decode(&data, 0, &schema, &WireConfig::default()),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn booleans_read_value_mask_even_when_absent() {
        let schema = Schema::builder("flags")
            .boolean("alive")
            .boolean("visible")
            .build()
            .unwrap();
        let data = [0b00, 0b00];
        let (record, next) = decode(&data, 0, &schema, &WireConfig::default()).unwrap();

        assert!(record.is_empty());
        assert_eq!(next, 2);
    }
}

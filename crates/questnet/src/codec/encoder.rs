use super::{CodecError, Element, Field, MAX_LENGTH, Record, Schema, Value, WireConfig, max_value};

pub(super) fn compute_size(
    record: &Record,
    schema: &Schema,
    wire: &WireConfig,
) -> Result<usize, CodecError> {
    let mut size = schema.properties_bytes() as usize;

    for field in schema.fields() {
        let Some(value) = record.get(field.name()) else {
            continue;
        };

        size += match field {
            Field::Numerical { name, bytes } => {
                expect_uint(name, value)?;
                bytes as usize
            }
            Field::String { name } => {
                let text = expect_str(name, value)?;
                1 + text.chars().count() * wire.bytes_per_char() as usize
            }
            Field::Array { name, element } => {
                1 + match (element, value) {
                    (Element::Int { bytes }, Value::Ints(values)) => values.len() * *bytes as usize,
                    (Element::Object(schema), Value::List(records)) => records
                        .iter()
                        .map(|record| compute_size(record, schema, wire))
                        .sum::<Result<usize, _>>()?,
                    (Element::Int { .. }, _) => {
                        return Err(mismatch(name, "integer array", value));
                    }
                    (Element::Object(_), _) => {
                        return Err(mismatch(name, "object array", value));
                    }
                }
            }
            Field::Map { name, schema } => {
                let Value::Map(entries) = value else {
                    return Err(mismatch(name, "map", value));
                };
                1 + entries.len() * wire.bytes_per_id() as usize
                    + entries
                        .values()
                        .map(|record| compute_size(record, schema, wire))
                        .sum::<Result<usize, _>>()?
            }
            Field::StandAlone { name, schema } => {
                let Value::Object(record) = value else {
                    return Err(mismatch(name, "object", value));
                };
                compute_size(record, schema, wire)?
            }
            Field::Boolean { name } => {
                expect_bool(name, value)?;
                0
            }
        };
    }

    if !schema.booleans().is_empty() {
        size += wire.boolean_bytes() as usize;
    }

    Ok(size)
}

pub(super) fn encode(
    record: &Record,
    schema: &Schema,
    wire: &WireConfig,
) -> Result<Vec<u8>, CodecError> {
    let size = compute_size(record, schema, wire)?;
    let mut writer = Writer {
        buf: Vec::with_capacity(size),
    };
    write_record(&mut writer, record, schema, wire)?;
    debug_assert_eq!(writer.buf.len(), size);
    Ok(writer.buf)
}

struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    #[inline]
    fn put(&mut self, value: u64, bytes: u8) {
        let be = value.to_be_bytes();
        self.buf.extend_from_slice(&be[8 - bytes as usize..]);
    }

    fn put_checked(&mut self, field: &'static str, value: u64, bytes: u8) -> Result<(), CodecError> {
        if value > max_value(bytes) {
            return Err(CodecError::ValueTooWide { field, value, bytes });
        }
        self.put(value, bytes);
        Ok(())
    }

    fn put_len(&mut self, field: &'static str, len: usize) -> Result<(), CodecError> {
        if len > MAX_LENGTH {
            return Err(CodecError::TooLong { field, len });
        }
        self.put(len as u64, 1);
        Ok(())
    }
}

fn write_record(
    writer: &mut Writer,
    record: &Record,
    schema: &Schema,
    wire: &WireConfig,
) -> Result<(), CodecError> {
    let count = schema.count_fields();
    let nb_booleans = schema.booleans().len();
    if nb_booleans > wire.boolean_bytes() as usize * 8 {
        return Err(CodecError::TooManyBooleans {
            schema: schema.name(),
            count: nb_booleans,
            bytes: wire.boolean_bytes(),
        });
    }
    // booleans close the field list
    let first_boolean = count - nb_booleans;

    let mut mask = 0u64;
    for (index, field) in schema.fields().enumerate() {
        if record.contains(field.name()) {
            mask |= Schema::mask_bit(index, count);
        }
    }
    writer.put(mask, schema.properties_bytes());

    let mut bools = 0u64;
    for (index, field) in schema.fields().enumerate() {
        let Some(value) = record.get(field.name()) else {
            continue;
        };

        match field {
            Field::Numerical { name, bytes } => {
                writer.put_checked(name, expect_uint(name, value)?, bytes)?;
            }
            Field::String { name } => {
                let text = expect_str(name, value)?;
                writer.put_len(name, text.chars().count())?;
                let width = wire.bytes_per_char();
                for ch in text.chars() {
                    if u64::from(ch as u32) > max_value(width) {
                        return Err(CodecError::CharTooWide {
                            field: name,
                            ch,
                            bytes: width,
                        });
                    }
                    writer.put(u64::from(ch as u32), width);
                }
            }
            Field::Array { name, element } => match (element, value) {
                (Element::Int { bytes }, Value::Ints(values)) => {
                    writer.put_len(name, values.len())?;
                    for &item in values {
                        writer.put_checked(name, item, *bytes)?;
                    }
                }
                (Element::Object(schema), Value::List(records)) => {
                    writer.put_len(name, records.len())?;
                    for record in records {
                        write_record(writer, record, schema, wire)?;
                    }
                }
                (Element::Int { .. }, _) => return Err(mismatch(name, "integer array", value)),
                (Element::Object(_), _) => return Err(mismatch(name, "object array", value)),
            },
            Field::Map { name, schema } => {
                let Value::Map(entries) = value else {
                    return Err(mismatch(name, "map", value));
                };
                writer.put_len(name, entries.len())?;
                let id_bytes = wire.bytes_per_id();
                for (&key, record) in entries {
                    if key > max_value(id_bytes) {
                        return Err(CodecError::IdTooWide {
                            field: name,
                            key,
                            bytes: id_bytes,
                        });
                    }
                    writer.put(key, id_bytes);
                    write_record(writer, record, schema, wire)?;
                }
            }
            Field::StandAlone { name, schema } => {
                let Value::Object(record) = value else {
                    return Err(mismatch(name, "object", value));
                };
                write_record(writer, record, schema, wire)?;
            }
            Field::Boolean { name } => {
                if expect_bool(name, value)? {
                    bools |= Schema::mask_bit(index - first_boolean, nb_booleans);
                }
            }
        }
    }

    if nb_booleans > 0 {
        writer.put(bools, wire.boolean_bytes());
    }

    Ok(())
}

fn mismatch(field: &'static str, expected: &'static str, found: &Value) -> CodecError {
    CodecError::TypeMismatch {
        field,
        expected,
        found: found.kind(),
    }
}

fn expect_uint(field: &'static str, value: &Value) -> Result<u64, CodecError> {
    match value {
        Value::Uint(v) => Ok(*v),
        other => Err(mismatch(field, "integer", other)),
    }
}

fn expect_str<'a>(field: &'static str, value: &'a Value) -> Result<&'a str, CodecError> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(mismatch(field, "string", other)),
    }
}

fn expect_bool(field: &'static str, value: &Value) -> Result<bool, CodecError> {
    match value {
        Value::Bool(b) => Ok(*b),
        other => Err(mismatch(field, "boolean", other)),
    }
}

use std::collections::HashSet;

use thiserror::Error;

pub const MAX_WIDTH: u8 = 8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("schema `{schema}`: field `{field}` is declared twice")]
    DuplicateField {
        schema: &'static str,
        field: &'static str,
    },
    #[error("schema `{schema}`: field `{field}` has unsupported width of {bytes} bytes")]
    InvalidWidth {
        schema: &'static str,
        field: &'static str,
        bytes: u8,
    },
    #[error("schema `{schema}`: {fields} fields do not fit in a {bytes}-byte presence mask")]
    MaskTooNarrow {
        schema: &'static str,
        fields: usize,
        bytes: u8,
    },
    #[error("wire constant `{name}` has unsupported width of {bytes} bytes")]
    InvalidWireWidth { name: &'static str, bytes: u8 },
}

/// Element type of an array field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    /// Unsigned integers written back to back, `bytes` wide each.
    Int { bytes: u8 },
    /// Nested objects, each carrying its own presence mask.
    Object(Schema),
}

/// One declared field, as visited in wire order.
#[derive(Debug, Clone, Copy)]
pub enum Field<'a> {
    Numerical { name: &'static str, bytes: u8 },
    String { name: &'static str },
    Array { name: &'static str, element: &'a Element },
    Map { name: &'static str, schema: &'a Schema },
    StandAlone { name: &'static str, schema: &'a Schema },
    Boolean { name: &'static str },
}

impl Field<'_> {
    pub fn name(&self) -> &'static str {
        match *self {
            Field::Numerical { name, .. }
            | Field::String { name }
            | Field::Array { name, .. }
            | Field::Map { name, .. }
            | Field::StandAlone { name, .. }
            | Field::Boolean { name } => name,
        }
    }
}

/// Static wire shape of one object level.
///
/// Field order inside each section is declaration order, and sections are
/// always laid out numerical, strings, arrays, maps, standalone, booleans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    name: &'static str,
    numerical: Vec<(&'static str, u8)>,
    strings: Vec<&'static str>,
    arrays: Vec<(&'static str, Element)>,
    maps: Vec<(&'static str, Schema)>,
    stand_alone: Vec<(&'static str, Schema)>,
    booleans: Vec<&'static str>,
    properties_bytes: u8,
}

impl Schema {
    pub fn builder(name: &'static str) -> SchemaBuilder {
        SchemaBuilder {
            schema: Schema {
                name,
                numerical: Vec::new(),
                strings: Vec::new(),
                arrays: Vec::new(),
                maps: Vec::new(),
                stand_alone: Vec::new(),
                booleans: Vec::new(),
                properties_bytes: 0,
            },
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn properties_bytes(&self) -> u8 {
        self.properties_bytes
    }

    pub fn numerical(&self) -> &[(&'static str, u8)] {
        &self.numerical
    }

    pub fn strings(&self) -> &[&'static str] {
        &self.strings
    }

    pub fn arrays(&self) -> &[(&'static str, Element)] {
        &self.arrays
    }

    pub fn maps(&self) -> &[(&'static str, Schema)] {
        &self.maps
    }

    pub fn stand_alone(&self) -> &[(&'static str, Schema)] {
        &self.stand_alone
    }

    pub fn booleans(&self) -> &[&'static str] {
        &self.booleans
    }

    pub fn count_fields(&self) -> usize {
        self.numerical.len()
            + self.strings.len()
            + self.arrays.len()
            + self.maps.len()
            + self.stand_alone.len()
            + self.booleans.len()
    }

    /// Fields in wire order. The position in this iterator is the field's
    /// index in the presence mask.
    pub fn fields(&self) -> impl Iterator<Item = Field<'_>> {
        let numerical = self
            .numerical
            .iter()
            .map(|&(name, bytes)| Field::Numerical { name, bytes });
        let strings = self.strings.iter().map(|&name| Field::String { name });
        let arrays = self
            .arrays
            .iter()
            .map(|(name, element)| Field::Array {
                name: *name,
                element,
            });
        let maps = self
            .maps
            .iter()
            .map(|(name, schema)| Field::Map {
                name: *name,
                schema,
            });
        let stand_alone = self
            .stand_alone
            .iter()
            .map(|(name, schema)| Field::StandAlone {
                name: *name,
                schema,
            });
        let booleans = self.booleans.iter().map(|&name| Field::Boolean { name });

        numerical
            .chain(strings)
            .chain(arrays)
            .chain(maps)
            .chain(stand_alone)
            .chain(booleans)
    }

    /// Presence-mask bit for the field at `index` (0-based) out of `count`.
    #[inline]
    pub fn mask_bit(index: usize, count: usize) -> u64 {
        1u64 << (count - 1 - index)
    }
}

pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    pub fn numerical(mut self, name: &'static str, bytes: u8) -> Self {
        self.schema.numerical.push((name, bytes));
        self
    }

    pub fn string(mut self, name: &'static str) -> Self {
        self.schema.strings.push(name);
        self
    }

    pub fn int_array(mut self, name: &'static str, bytes: u8) -> Self {
        self.schema.arrays.push((name, Element::Int { bytes }));
        self
    }

    pub fn object_array(mut self, name: &'static str, schema: Schema) -> Self {
        self.schema.arrays.push((name, Element::Object(schema)));
        self
    }

    pub fn map(mut self, name: &'static str, schema: Schema) -> Self {
        self.schema.maps.push((name, schema));
        self
    }

    pub fn stand_alone(mut self, name: &'static str, schema: Schema) -> Self {
        self.schema.stand_alone.push((name, schema));
        self
    }

    pub fn boolean(mut self, name: &'static str) -> Self {
        self.schema.booleans.push(name);
        self
    }

    /// Overrides the presence mask width. Without it the narrowest width
    /// that holds every field is used.
    pub fn properties_bytes(mut self, bytes: u8) -> Self {
        self.schema.properties_bytes = bytes;
        self
    }

    pub fn build(mut self) -> Result<Schema, SchemaError> {
        let schema_name = self.schema.name;
        let count = self.schema.count_fields();

        if self.schema.properties_bytes == 0 {
            self.schema.properties_bytes = count.div_ceil(8).max(1) as u8;
        }
        let properties_bytes = self.schema.properties_bytes;
        if properties_bytes > MAX_WIDTH || count > properties_bytes as usize * 8 {
            return Err(SchemaError::MaskTooNarrow {
                schema: schema_name,
                fields: count,
                bytes: properties_bytes,
            });
        }

        let mut seen = HashSet::with_capacity(count);
        for field in self.schema.fields() {
            let name = field.name();
            if !seen.insert(name) {
                return Err(SchemaError::DuplicateField {
                    schema: schema_name,
                    field: name,
                });
            }
            let width = match field {
                Field::Numerical { bytes, .. } => Some(bytes),
                Field::Array {
                    element: Element::Int { bytes },
                    ..
                } => Some(*bytes),
                _ => None,
            };
            if let Some(bytes) = width {
                if bytes == 0 || bytes > MAX_WIDTH {
                    return Err(SchemaError::InvalidWidth {
                        schema: schema_name,
                        field: name,
                        bytes,
                    });
                }
            }
        }

        Ok(self.schema)
    }
}

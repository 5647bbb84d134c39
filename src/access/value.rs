use crate::storage::error::{StorageError, StorageResult};

/// Data types supported by the heap file. All types are fixed-width so
/// that every tuple of one schema occupies the same number of bytes,
/// which is what the fixed-slot page layout relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Boolean,
    Int32,
    Int64,
    /// Fixed-capacity string of at most `n` bytes, stored as a u16 length
    /// prefix followed by zero-padded contents.
    Char(usize),
}

impl DataType {
    /// On-disk width of a field of this type.
    pub fn byte_size(&self) -> usize {
        match self {
            DataType::Boolean => 1,
            DataType::Int32 => 4,
            DataType::Int64 => 8,
            DataType::Char(n) => 2 + n,
        }
    }
}

/// Values that can be stored in a tuple field.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Char(String),
}

impl Value {
    /// Check if this value can be stored in a field of the given type.
    pub fn is_compatible_with(&self, data_type: DataType) -> bool {
        match (self, data_type) {
            (Value::Boolean(_), DataType::Boolean) => true,
            (Value::Int32(_), DataType::Int32) => true,
            (Value::Int64(_), DataType::Int64) => true,
            (Value::Char(s), DataType::Char(n)) => s.len() <= n,
            _ => false,
        }
    }
}

/// Ordered sequence of typed fields: the byte layout each tuple of one
/// heap file must match. Shared read-only by every tuple produced from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleDesc {
    types: Vec<DataType>,
}

impl TupleDesc {
    pub fn new(types: Vec<DataType>) -> Self {
        Self { types }
    }

    pub fn field_count(&self) -> usize {
        self.types.len()
    }

    pub fn field_type(&self, i: usize) -> DataType {
        self.types[i]
    }

    pub fn types(&self) -> &[DataType] {
        &self.types
    }

    /// Total on-disk tuple width for this schema.
    pub fn byte_size(&self) -> usize {
        self.types.iter().map(DataType::byte_size).sum()
    }
}

/// Serializes one tuple's values to the schema's fixed byte layout.
pub fn serialize_tuple(values: &[Value], desc: &TupleDesc) -> StorageResult<Vec<u8>> {
    if values.len() != desc.field_count() {
        return Err(StorageError::SchemaMismatch);
    }

    let mut data = Vec::with_capacity(desc.byte_size());
    for (value, data_type) in values.iter().zip(desc.types.iter()) {
        if !value.is_compatible_with(*data_type) {
            return Err(StorageError::SchemaMismatch);
        }
        match (value, data_type) {
            (Value::Boolean(b), DataType::Boolean) => data.push(u8::from(*b)),
            (Value::Int32(i), DataType::Int32) => data.extend_from_slice(&i.to_le_bytes()),
            (Value::Int64(i), DataType::Int64) => data.extend_from_slice(&i.to_le_bytes()),
            (Value::Char(s), DataType::Char(n)) => {
                let bytes = s.as_bytes();
                data.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
                data.extend_from_slice(bytes);
                data.resize(data.len() + (n - bytes.len()), 0);
            }
            _ => unreachable!("compatibility checked above"),
        }
    }
    Ok(data)
}

/// Decodes one tuple's values from the schema's fixed byte layout.
pub fn deserialize_tuple(bytes: &[u8], desc: &TupleDesc) -> StorageResult<Vec<Value>> {
    if bytes.len() != desc.byte_size() {
        return Err(StorageError::Corrupt(format!(
            "tuple is {} bytes, schema needs {}",
            bytes.len(),
            desc.byte_size()
        )));
    }

    let mut values = Vec::with_capacity(desc.field_count());
    let mut pos = 0;
    for data_type in &desc.types {
        let field = &bytes[pos..pos + data_type.byte_size()];
        pos += data_type.byte_size();
        let value = match data_type {
            DataType::Boolean => match field[0] {
                0 => Value::Boolean(false),
                1 => Value::Boolean(true),
                b => return Err(StorageError::Corrupt(format!("bad boolean byte {}", b))),
            },
            DataType::Int32 => {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(field);
                Value::Int32(i32::from_le_bytes(buf))
            }
            DataType::Int64 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(field);
                Value::Int64(i64::from_le_bytes(buf))
            }
            DataType::Char(n) => {
                let mut buf = [0u8; 2];
                buf.copy_from_slice(&field[..2]);
                let len = u16::from_le_bytes(buf) as usize;
                if len > *n {
                    return Err(StorageError::Corrupt(format!(
                        "char length {} exceeds capacity {}",
                        len, n
                    )));
                }
                let s = std::str::from_utf8(&field[2..2 + len])
                    .map_err(|e| StorageError::Corrupt(format!("invalid utf-8: {}", e)))?;
                Value::Char(s.to_string())
            }
        };
        values.push(value);
    }
    Ok(values)
}

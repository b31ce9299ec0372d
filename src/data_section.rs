//! MMDB data section encoding and decoding
//!
//! Every value stored in a MaxMind DB (record payloads and the metadata map)
//! uses the same self-describing encoding: a control byte carrying a 3-bit
//! type and a 5-bit size, optional size extension bytes, then the payload.
//! Types above 7 are "extended": the control byte carries type 0 and the
//! following byte holds `type - 7`.
//!
//! The encoder deduplicates whole values, so every network that carries the
//! same country record points at one copy in the data section.
//!
//! See: https://maxmind.github.io/MaxMind-DB/

use std::collections::{BTreeMap, HashMap};

const TYPE_EXTENDED: u8 = 0;
const TYPE_POINTER: u8 = 1;
const TYPE_STRING: u8 = 2;
const TYPE_DOUBLE: u8 = 3;
const TYPE_BYTES: u8 = 4;
const TYPE_UINT16: u8 = 5;
const TYPE_UINT32: u8 = 6;
const TYPE_MAP: u8 = 7;
const TYPE_INT32: u8 = 8;
const TYPE_UINT64: u8 = 9;
const TYPE_UINT128: u8 = 10;
const TYPE_ARRAY: u8 = 11;
const TYPE_BOOL: u8 = 14;
const TYPE_FLOAT: u8 = 15;

/// Largest payload size the control byte can describe
const MAX_SIZE: usize = 29 + 256 + 65536 + 0xFF_FFFF;

/// A value that can be stored in the data section
///
/// Maps use `BTreeMap` so encoded output is deterministic.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    /// UTF-8 string
    String(String),
    /// IEEE 754 double precision float
    Double(f64),
    /// Raw byte array
    Bytes(Vec<u8>),
    /// Unsigned 16-bit integer
    Uint16(u16),
    /// Unsigned 32-bit integer
    Uint32(u32),
    /// Key-value map (string keys only)
    Map(BTreeMap<String, DataValue>),
    /// Signed 32-bit integer
    Int32(i32),
    /// Unsigned 64-bit integer
    Uint64(u64),
    /// Unsigned 128-bit integer
    Uint128(u128),
    /// Array of values
    Array(Vec<DataValue>),
    /// Boolean value
    Bool(bool),
    /// IEEE 754 single precision float
    Float(f32),
}

impl DataValue {
    /// Look up a key if this value is a map
    pub fn get(&self, key: &str) -> Option<&DataValue> {
        match self {
            DataValue::Map(map) => map.get(key),
            _ => None,
        }
    }

    /// Borrow the string payload
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Widen any unsigned integer variant to u64
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            DataValue::Uint16(n) => Some(u64::from(*n)),
            DataValue::Uint32(n) => Some(u64::from(*n)),
            DataValue::Uint64(n) => Some(*n),
            DataValue::Uint128(n) => u64::try_from(*n).ok(),
            _ => None,
        }
    }
}

/// Data section encoder
///
/// Builds a data section by encoding values and tracking offsets.
/// Identical values get the same offset.
#[derive(Default)]
pub struct DataEncoder {
    buffer: Vec<u8>,
    offsets: HashMap<Vec<u8>, u32>,
}

impl DataEncoder {
    /// Create a new encoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode a value and return its offset in the section
    pub fn encode(&mut self, value: &DataValue) -> Result<u32, &'static str> {
        let mut encoded = Vec::new();
        write_value(value, &mut encoded)?;

        if let Some(&offset) = self.offsets.get(&encoded) {
            return Ok(offset);
        }

        let offset = u32::try_from(self.buffer.len()).map_err(|_| "Data section exceeds 4GiB")?;
        self.buffer.extend_from_slice(&encoded);
        self.offsets.insert(encoded, offset);
        Ok(offset)
    }

    /// Number of bytes encoded so far
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether nothing has been encoded yet
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Borrow the encoded section
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }
}

/// Encode a single value without deduplication
pub fn encode_value(value: &DataValue) -> Result<Vec<u8>, &'static str> {
    let mut out = Vec::new();
    write_value(value, &mut out)?;
    Ok(out)
}

fn write_value(value: &DataValue, out: &mut Vec<u8>) -> Result<(), &'static str> {
    match value {
        DataValue::String(s) => {
            write_control(TYPE_STRING, s.len(), out)?;
            out.extend_from_slice(s.as_bytes());
        }
        DataValue::Double(d) => {
            write_control(TYPE_DOUBLE, 8, out)?;
            out.extend_from_slice(&d.to_be_bytes());
        }
        DataValue::Bytes(b) => {
            write_control(TYPE_BYTES, b.len(), out)?;
            out.extend_from_slice(b);
        }
        DataValue::Uint16(n) => write_unsigned(TYPE_UINT16, &n.to_be_bytes(), out)?,
        DataValue::Uint32(n) => write_unsigned(TYPE_UINT32, &n.to_be_bytes(), out)?,
        DataValue::Uint64(n) => write_unsigned(TYPE_UINT64, &n.to_be_bytes(), out)?,
        DataValue::Uint128(n) => write_unsigned(TYPE_UINT128, &n.to_be_bytes(), out)?,
        DataValue::Int32(n) => {
            write_control(TYPE_INT32, 4, out)?;
            out.extend_from_slice(&n.to_be_bytes());
        }
        DataValue::Map(map) => {
            write_control(TYPE_MAP, map.len(), out)?;
            for (key, value) in map {
                write_control(TYPE_STRING, key.len(), out)?;
                out.extend_from_slice(key.as_bytes());
                write_value(value, out)?;
            }
        }
        DataValue::Array(items) => {
            write_control(TYPE_ARRAY, items.len(), out)?;
            for item in items {
                write_value(item, out)?;
            }
        }
        // Booleans carry their value in the size field
        DataValue::Bool(b) => write_control(TYPE_BOOL, usize::from(*b), out)?,
        DataValue::Float(f) => {
            write_control(TYPE_FLOAT, 4, out)?;
            out.extend_from_slice(&f.to_be_bytes());
        }
    }
    Ok(())
}

/// Unsigned integers are stored with leading zero bytes stripped
fn write_unsigned(type_id: u8, be_bytes: &[u8], out: &mut Vec<u8>) -> Result<(), &'static str> {
    let first = be_bytes
        .iter()
        .position(|&b| b != 0)
        .unwrap_or(be_bytes.len());
    let significant = &be_bytes[first..];
    write_control(type_id, significant.len(), out)?;
    out.extend_from_slice(significant);
    Ok(())
}

fn write_control(type_id: u8, size: usize, out: &mut Vec<u8>) -> Result<(), &'static str> {
    if size > MAX_SIZE {
        return Err("value too large for MMDB encoding");
    }

    let (size_marker, extra): (u8, Vec<u8>) = if size < 29 {
        (size as u8, Vec::new())
    } else if size < 29 + 256 {
        (29, vec![(size - 29) as u8])
    } else if size < 29 + 256 + 65536 {
        (30, ((size - 285) as u16).to_be_bytes().to_vec())
    } else {
        (31, ((size - 65821) as u32).to_be_bytes()[1..].to_vec())
    };

    if type_id > TYPE_MAP {
        out.push((TYPE_EXTENDED << 5) | size_marker);
        out.push(type_id - 7);
    } else {
        out.push((type_id << 5) | size_marker);
    }
    out.extend_from_slice(&extra);
    Ok(())
}

/// Data section decoder
///
/// Offsets (and pointers found in the data) are relative to the start of
/// `buffer`. Pointers are followed transparently.
pub struct DataDecoder<'a> {
    buffer: &'a [u8],
}

impl<'a> DataDecoder<'a> {
    /// Create a decoder over a data section (or a metadata section)
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer }
    }

    /// Decode the value stored at `offset`
    pub fn decode(&self, offset: u32) -> Result<DataValue, &'static str> {
        let mut cursor = offset as usize;
        self.decode_at(&mut cursor, true)
    }

    fn decode_at(&self, cursor: &mut usize, follow: bool) -> Result<DataValue, &'static str> {
        let ctrl = self.byte(cursor)?;
        let mut type_id = ctrl >> 5;

        if type_id == TYPE_POINTER {
            if !follow {
                return Err("pointer to pointer");
            }
            let target = self.read_pointer(cursor, ctrl)?;
            let mut target_cursor = target as usize;
            return self.decode_at(&mut target_cursor, false);
        }

        if type_id == TYPE_EXTENDED {
            let ext = self.byte(cursor)?;
            type_id = ext.checked_add(7).ok_or("unknown extended type")?;
            if type_id <= TYPE_MAP {
                return Err("invalid extended type");
            }
        }

        let size = self.read_size(cursor, ctrl & 0x1F)?;

        match type_id {
            TYPE_STRING => {
                let bytes = self.take(cursor, size)?;
                let s = std::str::from_utf8(bytes).map_err(|_| "Invalid UTF-8")?;
                Ok(DataValue::String(s.to_string()))
            }
            TYPE_DOUBLE => {
                if size != 8 {
                    return Err("double must be 8 bytes");
                }
                let mut raw = [0u8; 8];
                raw.copy_from_slice(self.take(cursor, 8)?);
                Ok(DataValue::Double(f64::from_be_bytes(raw)))
            }
            TYPE_BYTES => Ok(DataValue::Bytes(self.take(cursor, size)?.to_vec())),
            TYPE_UINT16 => Ok(DataValue::Uint16(self.read_uint(cursor, size, 2)? as u16)),
            TYPE_UINT32 => Ok(DataValue::Uint32(self.read_uint(cursor, size, 4)? as u32)),
            TYPE_UINT64 => Ok(DataValue::Uint64(self.read_uint(cursor, size, 8)? as u64)),
            TYPE_UINT128 => Ok(DataValue::Uint128(self.read_uint(cursor, size, 16)?)),
            TYPE_INT32 => {
                let raw = self.read_uint(cursor, size, 4)? as u32;
                Ok(DataValue::Int32(raw as i32))
            }
            TYPE_MAP => {
                let mut map = BTreeMap::new();
                for _ in 0..size {
                    let key = match self.decode_at(cursor, true)? {
                        DataValue::String(s) => s,
                        _ => return Err("map key must be string"),
                    };
                    let value = self.decode_at(cursor, true)?;
                    map.insert(key, value);
                }
                Ok(DataValue::Map(map))
            }
            TYPE_ARRAY => {
                let mut items = Vec::with_capacity(size.min(1024));
                for _ in 0..size {
                    items.push(self.decode_at(cursor, true)?);
                }
                Ok(DataValue::Array(items))
            }
            TYPE_BOOL => match size {
                0 => Ok(DataValue::Bool(false)),
                1 => Ok(DataValue::Bool(true)),
                _ => Err("invalid bool size"),
            },
            TYPE_FLOAT => {
                if size != 4 {
                    return Err("float must be 4 bytes");
                }
                let mut raw = [0u8; 4];
                raw.copy_from_slice(self.take(cursor, 4)?);
                Ok(DataValue::Float(f32::from_be_bytes(raw)))
            }
            _ => Err("unknown data type"),
        }
    }

    fn read_pointer(&self, cursor: &mut usize, ctrl: u8) -> Result<u32, &'static str> {
        let size = (ctrl >> 3) & 0x3;
        let high = u32::from(ctrl & 0x7);
        let bytes = self.take(cursor, size as usize + 1)?;
        let tail = bytes.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b));
        Ok(match size {
            0 => (high << 8) | tail,
            1 => ((high << 16) | tail) + 2048,
            2 => ((high << 24) | tail) + 526_336,
            _ => tail,
        })
    }

    fn read_size(&self, cursor: &mut usize, marker: u8) -> Result<usize, &'static str> {
        match marker {
            0..=28 => Ok(marker as usize),
            29 => Ok(29 + self.byte(cursor)? as usize),
            30 => {
                let b = self.take(cursor, 2)?;
                Ok(285 + ((b[0] as usize) << 8 | b[1] as usize))
            }
            _ => {
                let b = self.take(cursor, 3)?;
                Ok(65_821 + ((b[0] as usize) << 16 | (b[1] as usize) << 8 | b[2] as usize))
            }
        }
    }

    fn read_uint(&self, cursor: &mut usize, size: usize, max: usize) -> Result<u128, &'static str> {
        if size > max {
            return Err("integer payload too large");
        }
        let bytes = self.take(cursor, size)?;
        Ok(bytes.iter().fold(0u128, |acc, &b| (acc << 8) | u128::from(b)))
    }

    fn byte(&self, cursor: &mut usize) -> Result<u8, &'static str> {
        let b = *self.buffer.get(*cursor).ok_or("cursor out of bounds")?;
        *cursor += 1;
        Ok(b)
    }

    fn take(&self, cursor: &mut usize, len: usize) -> Result<&'a [u8], &'static str> {
        let end = cursor.checked_add(len).ok_or("length overflow")?;
        let slice = self.buffer.get(*cursor..end).ok_or("data out of bounds")?;
        *cursor = end;
        Ok(slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(value: &DataValue) -> DataValue {
        let bytes = encode_value(value).unwrap();
        DataDecoder::new(&bytes).decode(0).unwrap()
    }

    #[test]
    fn test_known_encodings() {
        // Byte layouts taken from the MaxMind DB format document
        assert_eq!(encode_value(&DataValue::Bool(true)).unwrap(), vec![0x01, 0x07]);
        assert_eq!(encode_value(&DataValue::Bool(false)).unwrap(), vec![0x00, 0x07]);
        assert_eq!(encode_value(&DataValue::Uint16(0)).unwrap(), vec![0xA0]);
        assert_eq!(
            encode_value(&DataValue::Uint32(1_814_991)).unwrap(),
            vec![0xC3, 0x1B, 0xB1, 0xCF]
        );
        assert_eq!(
            encode_value(&DataValue::Uint64(1)).unwrap(),
            vec![0x01, 0x02, 0x01]
        );
        assert_eq!(
            encode_value(&DataValue::String("CN".to_string())).unwrap(),
            vec![0x42, b'C', b'N']
        );
    }

    #[test]
    fn test_country_map() {
        let mut names = BTreeMap::new();
        names.insert("en".to_string(), DataValue::String("China".to_string()));
        names.insert("ja".to_string(), DataValue::String("中国".to_string()));

        let mut country = BTreeMap::new();
        country.insert("geoname_id".to_string(), DataValue::Uint32(1_814_991));
        country.insert("is_in_european_union".to_string(), DataValue::Bool(false));
        country.insert("iso_code".to_string(), DataValue::String("CN".to_string()));
        country.insert("names".to_string(), DataValue::Map(names));

        let mut root = BTreeMap::new();
        root.insert("country".to_string(), DataValue::Map(country));
        let value = DataValue::Map(root);

        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn test_size_boundaries() {
        for len in [28, 29, 284, 285, 65_820, 65_821, 70_000] {
            let value = DataValue::String("x".repeat(len));
            assert_eq!(roundtrip(&value), value, "length {}", len);
        }
    }

    #[test]
    fn test_extended_types() {
        let value = DataValue::Array(vec![
            DataValue::Int32(-42),
            DataValue::Uint64(u64::MAX),
            DataValue::Uint128(1 << 100),
            DataValue::Float(2.5),
            DataValue::Double(-0.25),
            DataValue::Bytes(vec![0xDE, 0xAD]),
        ]);
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn test_deduplication() {
        let mut encoder = DataEncoder::new();
        let a = DataValue::String("same".to_string());
        let b = DataValue::String("other".to_string());

        let first = encoder.encode(&a).unwrap();
        let second = encoder.encode(&b).unwrap();
        let again = encoder.encode(&a).unwrap();

        assert_eq!(first, again);
        assert_ne!(first, second);
        assert_eq!(encoder.len(), 5 + 6);
    }

    #[test]
    fn test_decoder_follows_pointers() {
        // offset 0: "CN"; offset 3: map {"iso_code": <pointer to 0>}
        let mut buffer = vec![0x42, b'C', b'N'];
        buffer.push(0xE1);
        buffer.push(0x48);
        buffer.extend_from_slice(b"iso_code");
        buffer.extend_from_slice(&[0x20, 0x00]);

        let decoded = DataDecoder::new(&buffer).decode(3).unwrap();
        assert_eq!(decoded.get("iso_code").and_then(DataValue::as_str), Some("CN"));
    }

    #[test]
    fn test_decoder_rejects_truncated() {
        let bytes = [0x44, b'a'];
        assert!(DataDecoder::new(&bytes).decode(0).is_err());
        assert!(DataDecoder::new(&[]).decode(0).is_err());
    }
}

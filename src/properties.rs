//! Typed MAPI property access over a storage.
//!
//! A storage exposes its fixed-size property values through the
//! `__properties_version1.0` stream (16-byte records after a header whose
//! size depends on the kind of object) and its variable-length values
//! through sibling `__substg1.0_IIIITTTT` streams, where `IIII` is the
//! property id and `TTTT` the type code.

use std::cell::RefCell;
use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::{MsgError, Result};
use crate::oxprops::tags;
use crate::storage::{ChildKind, Container};

/// Seconds between the FILETIME epoch (1601-01-01) and the Unix epoch.
const FILETIME_UNIX_OFFSET_SECS: i64 = 11_644_473_600;

bitflags::bitflags! {
    pub struct PropertyFlags: u32 {
        const MANDATORY = 0x0000_0001;
        const READABLE = 0x0000_0002;
        const WRITABLE = 0x0000_0004;
    }
}

/// MS-OXCDATA property type codes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PType {
    Unspecified,
    Null,
    Integer16,
    Integer32,
    Floating32,
    Floating64,
    Currency,
    FloatingTime,
    ErrorCode,
    Boolean,
    Object,
    Integer64,
    String8,
    String,
    Time,
    Guid,
    Binary,
    MultipleInteger32,
    MultipleString8,
    MultipleString,
    MultipleBinary,
}

impl PType {
    pub fn from_bits(bits: u16) -> Option<Self> {
        match bits {
            0x0000 => Some(Self::Unspecified),
            0x0001 => Some(Self::Null),
            0x0002 => Some(Self::Integer16),
            0x0003 => Some(Self::Integer32),
            0x0004 => Some(Self::Floating32),
            0x0005 => Some(Self::Floating64),
            0x0006 => Some(Self::Currency),
            0x0007 => Some(Self::FloatingTime),
            0x000A => Some(Self::ErrorCode),
            0x000B => Some(Self::Boolean),
            0x000D => Some(Self::Object),
            0x0014 => Some(Self::Integer64),
            0x001E => Some(Self::String8),
            0x001F => Some(Self::String),
            0x0040 => Some(Self::Time),
            0x0048 => Some(Self::Guid),
            0x0102 => Some(Self::Binary),
            0x1003 => Some(Self::MultipleInteger32),
            0x101E => Some(Self::MultipleString8),
            0x101F => Some(Self::MultipleString),
            0x1102 => Some(Self::MultipleBinary),
            _ => None,
        }
    }

    pub fn to_bits(self) -> u16 {
        match self {
            Self::Unspecified => 0x0000,
            Self::Null => 0x0001,
            Self::Integer16 => 0x0002,
            Self::Integer32 => 0x0003,
            Self::Floating32 => 0x0004,
            Self::Floating64 => 0x0005,
            Self::Currency => 0x0006,
            Self::FloatingTime => 0x0007,
            Self::ErrorCode => 0x000A,
            Self::Boolean => 0x000B,
            Self::Object => 0x000D,
            Self::Integer64 => 0x0014,
            Self::String8 => 0x001E,
            Self::String => 0x001F,
            Self::Time => 0x0040,
            Self::Guid => 0x0048,
            Self::Binary => 0x0102,
            Self::MultipleInteger32 => 0x1003,
            Self::MultipleString8 => 0x101E,
            Self::MultipleString => 0x101F,
            Self::MultipleBinary => 0x1102,
        }
    }
}

/// The 8-byte payload of a fixed property record. Variable-length types
/// only record their size here; the bytes live in a sibling stream.
#[derive(Clone, Debug, PartialEq)]
pub enum PValue {
    Integer16(i16),
    Integer32(i32),
    Floating32(f32),
    Floating64(f64),
    Currency(i64),
    ErrorCode(u32),
    Boolean(bool),
    Integer64(i64),
    Time(DateTime<Utc>),
    Size(PType, u32),
    Null,
    Object,
}

impl PValue {
    pub fn from_bytes(ptype: PType, data: [u8; 8]) -> Result<PValue> {
        let value = match ptype {
            PType::Integer16 => PValue::Integer16(i16::from_le_bytes([data[0], data[1]])),
            PType::Integer32 => {
                PValue::Integer32(i32::from_le_bytes([data[0], data[1], data[2], data[3]]))
            }
            PType::Floating32 => {
                PValue::Floating32(f32::from_le_bytes([data[0], data[1], data[2], data[3]]))
            }
            PType::Floating64 => PValue::Floating64(f64::from_le_bytes(data)),
            PType::Currency => PValue::Currency(i64::from_le_bytes(data)),
            PType::ErrorCode => {
                PValue::ErrorCode(u32::from_le_bytes([data[0], data[1], data[2], data[3]]))
            }
            PType::Boolean => PValue::Boolean(data[0] == 1),
            PType::Integer64 => PValue::Integer64(i64::from_le_bytes(data)),
            PType::Time => {
                let ticks = i64::from_le_bytes(data);
                let time = filetime_to_datetime(ticks).ok_or_else(|| {
                    MsgError::CorruptData(format!("FILETIME out of range: {ticks}"))
                })?;
                PValue::Time(time)
            }
            PType::Null => PValue::Null,
            PType::Object => PValue::Object,
            // Everything else is stored out of line.
            other => PValue::Size(
                other,
                u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            ),
        };
        Ok(value)
    }
}

/// One 16-byte record from the property stream.
#[derive(Clone, Debug)]
pub struct PropertyRecord {
    pub id: u16,
    pub ptype: PType,
    pub flags: PropertyFlags,
    pub value: PValue,
}

/// Converts a FILETIME tick count (100 ns units since 1601) to UTC.
pub fn filetime_to_datetime(ticks: i64) -> Option<DateTime<Utc>> {
    let secs = ticks / 10_000_000 - FILETIME_UNIX_OFFSET_SECS;
    let nanos = ((ticks % 10_000_000).unsigned_abs() * 100) as u32;
    DateTime::from_timestamp(secs, nanos)
}

/// Decodes a UTF-16LE stream payload.
pub fn decode_unicode(bytes: &[u8]) -> Result<String> {
    if bytes.len() % 2 != 0 {
        return Err(MsgError::InvalidFormat(
            "unicode stream length is not a multiple of 2".to_string(),
        ));
    }
    let points: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    Ok(String::from_utf16_lossy(&points)
        .trim_end_matches('\0')
        .to_string())
}

/// Decodes an 8-bit string payload: UTF-8 when it is, Windows-1252
/// otherwise (accepts every byte).
pub fn decode_string8(bytes: &[u8]) -> String {
    let text = match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    };
    text.trim_end_matches('\0').to_string()
}

/// Parses the fixed records of a property stream, skipping the
/// caller-supplied header.
pub fn parse_property_stream(bytes: &[u8], header_size: usize) -> Result<Vec<PropertyRecord>> {
    if bytes.len() < header_size {
        return Err(MsgError::InvalidFormat(format!(
            "property stream shorter than its {header_size}-byte header"
        )));
    }
    let mut records = Vec::new();
    for chunk in bytes[header_size..].chunks_exact(16) {
        let type_bits = u16::from_le_bytes([chunk[0], chunk[1]]);
        let ptype = PType::from_bits(type_bits).ok_or_else(|| {
            MsgError::InvalidFormat(format!("unknown property type code 0x{type_bits:04X}"))
        })?;
        let id = u16::from_le_bytes([chunk[2], chunk[3]]);
        let flags = PropertyFlags::from_bits_truncate(u32::from_le_bytes([
            chunk[4], chunk[5], chunk[6], chunk[7],
        ]));
        let payload: [u8; 8] = [
            chunk[8], chunk[9], chunk[10], chunk[11], chunk[12], chunk[13], chunk[14], chunk[15],
        ];
        records.push(PropertyRecord {
            id,
            ptype,
            flags,
            value: PValue::from_bytes(ptype, payload)?,
        });
    }
    Ok(records)
}

#[derive(Clone, Debug)]
enum CachedValue {
    Text(String),
    Bytes(Vec<u8>),
    List(Vec<String>),
}

/// Typed property access for one storage. Values are decoded on first
/// access and memoized; absent properties are `None`, type mismatches are
/// errors.
pub struct PropertyBag {
    container: Container,
    header_size: usize,
    records: HashMap<u16, PropertyRecord>,
    streams: HashMap<u16, (PType, String)>,
    cache: RefCell<HashMap<u16, CachedValue>>,
}

impl PropertyBag {
    /// Builds the bag for `container`, parsing the property stream with the
    /// given header size. The caller knows the header size from the kind of
    /// object; it is never inferred.
    pub fn new(container: Container, header_size: usize) -> Result<Self> {
        let records = match container.read_stream(tags::PROPERTIES_STREAM) {
            Ok(bytes) => parse_property_stream(&bytes, header_size)?
                .into_iter()
                .map(|record| (record.id, record))
                .collect(),
            Err(MsgError::NotFound(_)) => {
                log::debug!("storage {:?} has no property stream", container.path());
                HashMap::new()
            }
            Err(err) => return Err(err),
        };

        let mut streams = HashMap::new();
        for child in container.list_children()? {
            if child.kind != ChildKind::Stream {
                continue;
            }
            if let Some((id, ptype)) = parse_substream_name(&child.name) {
                streams.insert(id, (ptype, child.name));
            }
        }

        Ok(Self {
            container,
            header_size,
            records,
            streams,
            cache: RefCell::new(HashMap::new()),
        })
    }

    pub fn header_size(&self) -> usize {
        self.header_size
    }

    /// Raw bytes of the property stream, when present. The named property
    /// scan reads record ids straight out of these.
    pub fn raw_property_stream(&self) -> Result<Option<Vec<u8>>> {
        match self.container.read_stream(tags::PROPERTIES_STREAM) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(MsgError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// The fixed record for a property id, when the stream carried one.
    pub fn record(&self, id: u16) -> Option<&PropertyRecord> {
        self.records.get(&id)
    }

    fn stream_bytes(&self, name: &str) -> Result<Vec<u8>> {
        self.container.read_stream(name)
    }

    /// String property (unicode or 8-bit variant).
    pub fn string(&self, id: u16) -> Result<Option<String>> {
        if let Some(CachedValue::Text(text)) = self.cache.borrow().get(&id) {
            return Ok(Some(text.clone()));
        }
        let Some((ptype, name)) = self.streams.get(&id) else {
            return match self.records.get(&id) {
                None => Ok(None),
                Some(record) => Err(record_without_stream(id, "string", record)),
            };
        };
        let text = match ptype {
            PType::String => decode_unicode(&self.stream_bytes(name)?)?,
            PType::String8 => decode_string8(&self.stream_bytes(name)?),
            other => return Err(type_mismatch(id, "string", *other)),
        };
        self.cache
            .borrow_mut()
            .insert(id, CachedValue::Text(text.clone()));
        Ok(Some(text))
    }

    /// 32-bit integer property. Tolerates the container's native 16, 32 and
    /// 64-bit little-endian encodings as long as the value fits.
    pub fn int32(&self, id: u16) -> Result<Option<i32>> {
        match self.records.get(&id).map(|record| &record.value) {
            None => match self.streams.get(&id) {
                Some((ptype, _)) => Err(type_mismatch(id, "int32", *ptype)),
                None => Ok(None),
            },
            Some(PValue::Integer32(value)) => Ok(Some(*value)),
            Some(PValue::Integer16(value)) => Ok(Some(i32::from(*value))),
            Some(PValue::Integer64(value)) => i32::try_from(*value).map(Some).map_err(|_| {
                MsgError::InvalidFormat(format!("property 0x{id:04X} exceeds 32 bits"))
            }),
            Some(_) => Err(type_mismatch(id, "int32", self.records[&id].ptype)),
        }
    }

    /// Boolean property.
    pub fn boolean(&self, id: u16) -> Result<Option<bool>> {
        match self.records.get(&id).map(|record| &record.value) {
            None => match self.streams.get(&id) {
                Some((ptype, _)) => Err(type_mismatch(id, "boolean", *ptype)),
                None => Ok(None),
            },
            Some(PValue::Boolean(value)) => Ok(Some(*value)),
            Some(_) => Err(type_mismatch(id, "boolean", self.records[&id].ptype)),
        }
    }

    /// UTC timestamp property. A 64-bit integer record is accepted as a raw
    /// FILETIME tick count.
    pub fn datetime(&self, id: u16) -> Result<Option<DateTime<Utc>>> {
        match self.records.get(&id).map(|record| &record.value) {
            None => match self.streams.get(&id) {
                Some((ptype, _)) => Err(type_mismatch(id, "datetime", *ptype)),
                None => Ok(None),
            },
            Some(PValue::Time(value)) => Ok(Some(*value)),
            Some(PValue::Integer64(ticks)) => filetime_to_datetime(*ticks).map(Some).ok_or_else(
                || MsgError::CorruptData(format!("FILETIME out of range in 0x{id:04X}")),
            ),
            Some(_) => Err(type_mismatch(id, "datetime", self.records[&id].ptype)),
        }
    }

    /// Binary property.
    pub fn bytes(&self, id: u16) -> Result<Option<Vec<u8>>> {
        if let Some(CachedValue::Bytes(bytes)) = self.cache.borrow().get(&id) {
            return Ok(Some(bytes.clone()));
        }
        let Some((ptype, name)) = self.streams.get(&id) else {
            return match self.records.get(&id) {
                None => Ok(None),
                Some(record) => Err(record_without_stream(id, "binary", record)),
            };
        };
        if *ptype != PType::Binary {
            return Err(type_mismatch(id, "binary", *ptype));
        }
        let bytes = self.stream_bytes(name)?;
        self.cache
            .borrow_mut()
            .insert(id, CachedValue::Bytes(bytes.clone()));
        Ok(Some(bytes))
    }

    /// Raw bytes of whichever stream backs a string or binary property.
    /// Used for values whose interpretation depends on another property
    /// (HTML bodies with a code page).
    pub fn raw_value(&self, id: u16) -> Result<Option<(PType, Vec<u8>)>> {
        match self.streams.get(&id) {
            None => Ok(None),
            Some((ptype, name)) => Ok(Some((*ptype, self.stream_bytes(name)?))),
        }
    }

    /// Multi-valued string property. Each value lives in its own
    /// `__substg1.0_IIII101F-XXXXXXXX` stream.
    pub fn string_list(&self, id: u16) -> Result<Option<Vec<String>>> {
        if let Some(CachedValue::List(list)) = self.cache.borrow().get(&id) {
            return Ok(Some(list.clone()));
        }
        let Some((ptype, name)) = self.streams.get(&id) else {
            return match self.records.get(&id) {
                None => Ok(None),
                Some(record) => Err(record_without_stream(id, "string list", record)),
            };
        };
        if !matches!(ptype, PType::MultipleString | PType::MultipleString8) {
            return Err(type_mismatch(id, "string list", *ptype));
        }
        let mut values = Vec::new();
        for index in 0u32.. {
            let value_name = format!("{name}-{index:08X}");
            if !self.container.has_child(&value_name) {
                break;
            }
            let bytes = self.stream_bytes(&value_name)?;
            let value = match ptype {
                PType::MultipleString => decode_unicode(&bytes)?,
                _ => decode_string8(&bytes),
            };
            values.push(value);
        }
        self.cache
            .borrow_mut()
            .insert(id, CachedValue::List(values.clone()));
        Ok(Some(values))
    }
}

fn type_mismatch(id: u16, wanted: &str, got: PType) -> MsgError {
    MsgError::InvalidFormat(format!(
        "property 0x{id:04X} is not a {wanted} (stored as {got:?})"
    ))
}

/// A fixed record announcing an out-of-line value whose stream is absent is
/// corruption, not a type mismatch.
fn record_without_stream(id: u16, wanted: &str, record: &PropertyRecord) -> MsgError {
    match record.value {
        PValue::Size(ptype, size) => MsgError::CorruptData(format!(
            "property 0x{id:04X} declares a {size}-byte {ptype:?} stream that is missing"
        )),
        _ => type_mismatch(id, wanted, record.ptype),
    }
}

/// Splits a `__substg1.0_IIIITTTT` stream name into id and type. Value
/// streams of multi-valued properties (`-XXXXXXXX` suffix) are skipped;
/// they are reached through their base entry.
fn parse_substream_name(name: &str) -> Option<(u16, PType)> {
    let hex = name.strip_prefix(tags::SUB_STG_PREFIX)?;
    if hex.len() != 8 {
        return None;
    }
    let id = u16::from_str_radix(&hex[0..4], 16).ok()?;
    let type_bits = u16::from_str_radix(&hex[4..8], 16).ok()?;
    Some((id, PType::from_bits(type_bits)?))
}

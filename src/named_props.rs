//! Named property resolution.
//!
//! Property ids 0x8000–0xFFFE are only meaningful within one file; the
//! `__nameid_version1.0` storage is the authority that maps them back to a
//! stable identifier (a numeric id or a name, scoped by a property set
//! GUID). Candidates are gathered from sub-stream names and from the raw
//! property stream records, then resolved against the authority's
//! entry stream.

use std::collections::{BTreeMap, BTreeSet};

use uuid::Uuid;

use crate::error::{MsgError, Result};
use crate::oxprops::property_sets::PropertySet;
use crate::oxprops::tags;
use crate::storage::{ChildKind, Container};

const GUID_STREAM: &str = "__substg1.0_00020102";
const ENTRY_STREAM: &str = "__substg1.0_00030102";
const STRING_STREAM: &str = "__substg1.0_00040102";

/// The stable identifier a named property maps to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NamedPropertyIdentifier {
    /// Numeric id (LID) within the property set.
    Id(u32),
    /// Name within the property set.
    Name(String),
}

/// One resolved named property.
#[derive(Clone, Debug)]
pub struct NamedProperty {
    pub identifier: NamedPropertyIdentifier,
    pub property_set: PropertySet,
    /// Name of the mapping stream derived from the identifier, as the
    /// format prescribes. Kept for diagnostics.
    pub stream_name: String,
}

/// Mapping from in-file property id to stable identifier, built once per
/// top-level message. Embedded messages reference their top ancestor's map.
#[derive(Debug, Default)]
pub struct NamedPropertyMap {
    entries: BTreeMap<u16, NamedProperty>,
}

impl NamedPropertyMap {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, id: u16) -> Option<&NamedProperty> {
        self.entries.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u16, &NamedProperty)> {
        self.entries.iter()
    }

    /// Finds the in-file property id carrying the given name, if any.
    pub fn id_of_name(&self, name: &str) -> Option<u16> {
        self.entries.iter().find_map(|(id, entry)| {
            match &entry.identifier {
                NamedPropertyIdentifier::Name(entry_name) if entry_name == name => Some(*id),
                _ => None,
            }
        })
    }

    /// Finds the in-file property id carrying the given numeric id within
    /// a property set. LIDs are only unique per set.
    pub fn id_of_lid(&self, lid: u32, property_set: PropertySet) -> Option<u16> {
        self.entries.iter().find_map(|(id, entry)| {
            match entry.identifier {
                NamedPropertyIdentifier::Id(entry_lid)
                    if entry_lid == lid && entry.property_set == property_set =>
                {
                    Some(*id)
                }
                _ => None,
            }
        })
    }
}

/// Gathers candidate named-property ids from the storage's stream names and
/// its raw property stream, deduplicated and restricted to the named range.
pub fn gather_candidates(
    children: &[crate::storage::ChildEntry],
    property_stream: Option<&[u8]>,
    header_size: usize,
) -> Vec<u16> {
    let mut candidates = BTreeSet::new();

    for child in children {
        if child.kind != ChildKind::Stream {
            continue;
        }
        let Some(hex) = child.name.strip_prefix(tags::SUB_STG_PREFIX) else {
            continue;
        };
        if hex.len() < 4 {
            continue;
        }
        if let Ok(id) = u16::from_str_radix(&hex[0..4], 16) {
            if (tags::NAMED_PROPERTY_START..=tags::NAMED_PROPERTY_END).contains(&id) {
                candidates.insert(id);
            }
        }
    }

    if let Some(bytes) = property_stream {
        if bytes.len() >= header_size {
            for chunk in bytes[header_size..].chunks_exact(16) {
                let id = u16::from_le_bytes([chunk[2], chunk[3]]);
                if (tags::NAMED_PROPERTY_START..=tags::NAMED_PROPERTY_END).contains(&id) {
                    candidates.insert(id);
                }
            }
        }
    }

    candidates.into_iter().collect()
}

/// Resolves candidate ids against the `__nameid_version1.0` storage.
/// Returns an empty map when there is nothing to resolve.
pub fn resolve(nameid: &Container, candidates: &[u16]) -> Result<NamedPropertyMap> {
    let mut map = NamedPropertyMap::default();
    if candidates.is_empty() {
        return Ok(map);
    }

    let entry_bytes = nameid.read_stream(ENTRY_STREAM).map_err(|err| match err {
        MsgError::NotFound(_) => {
            MsgError::InvalidFormat("named property storage has no entry stream".to_string())
        }
        other => other,
    })?;
    let guid_stream = match nameid.read_stream(GUID_STREAM) {
        Ok(bytes) => GuidStream::new(bytes),
        Err(MsgError::NotFound(_)) => GuidStream::new(Vec::new()),
        Err(err) => return Err(err),
    };
    let string_stream = match nameid.read_stream(STRING_STREAM) {
        Ok(bytes) => StringStream::new(bytes),
        Err(MsgError::NotFound(_)) => StringStream::new(Vec::new()),
        Err(err) => return Err(err),
    };

    for chunk in entry_bytes.chunks_exact(8) {
        let (property_index, guid_index, kind) =
            parse_kind_index([chunk[4], chunk[5], chunk[6], chunk[7]])?;
        let property_id = tags::NAMED_PROPERTY_START.wrapping_add(property_index);
        if !candidates.contains(&property_id) {
            continue;
        }

        let identifier_bytes = [chunk[0], chunk[1], chunk[2], chunk[3]];
        let identifier = match kind {
            PropertyKind::Numerical => {
                NamedPropertyIdentifier::Id(u32::from_le_bytes(identifier_bytes))
            }
            PropertyKind::String => {
                let offset = u32::from_le_bytes(identifier_bytes);
                NamedPropertyIdentifier::Name(string_stream.get(offset as usize)?)
            }
        };
        let property_set = match guid_index {
            GuidIndex::PsMapi => PropertySet::PsMapi,
            GuidIndex::PublicStrings => PropertySet::PublicStrings,
            GuidIndex::StreamIndex(index) => {
                PropertySet::from_uuid(guid_stream.get(index as usize)?)
            }
        };
        let stream_name = mapping_stream_name(&identifier_bytes, kind, guid_index);
        log::debug!(
            "named property 0x{property_id:04X} -> {identifier:?} in {}",
            property_set.as_str()
        );
        map.entries.insert(
            property_id,
            NamedProperty {
                identifier,
                property_set,
                stream_name,
            },
        );
    }

    Ok(map)
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum PropertyKind {
    Numerical,
    String,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum GuidIndex {
    PsMapi,
    PublicStrings,
    StreamIndex(u16),
}

impl GuidIndex {
    fn new(value: u16) -> Result<Self> {
        match value {
            0 => Err(MsgError::InvalidFormat(
                "named property GUID index must be non-zero".to_string(),
            )),
            1 => Ok(Self::PsMapi),
            2 => Ok(Self::PublicStrings),
            value => Ok(Self::StreamIndex(value - 3)),
        }
    }

    fn as_num(self) -> u16 {
        match self {
            Self::PsMapi => 1,
            Self::PublicStrings => 2,
            Self::StreamIndex(index) => index + 3,
        }
    }
}

/// Unpacks the second dword of an entry: kind bit, GUID index and the
/// property index that places the id within the named range.
fn parse_kind_index(data: [u8; 4]) -> Result<(u16, GuidIndex, PropertyKind)> {
    let kind = if data[0] & 0x1 == 1 {
        PropertyKind::String
    } else {
        PropertyKind::Numerical
    };
    let guid_index = GuidIndex::new(u16::from_le_bytes([data[0], data[1]]) >> 1)?;
    let property_index = u16::from_le_bytes([data[2], data[3]]);
    Ok((property_index, guid_index, kind))
}

/// Derives the `__substg1.0_1XXX0102` mapping stream name for an entry.
fn mapping_stream_name(identifier: &[u8; 4], kind: PropertyKind, guid_index: GuidIndex) -> String {
    let stream_id = match kind {
        PropertyKind::Numerical => {
            let id = u32::from_le_bytes(*identifier);
            0x1000 + ((id as u16) ^ (guid_index.as_num() << 1)) % 0x1F
        }
        PropertyKind::String => {
            let crc = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);
            let mut digest = crc.digest();
            digest.update(identifier);
            let checksum = digest.finalize();
            0x1000 + ((checksum as u16) ^ ((guid_index.as_num() << 1) | 1)) % 0x1F
        }
    };
    let hex_id: u32 = ((stream_id as u32) << 16) | 0x0000_0102;
    format!("{}{:X}", tags::SUB_STG_PREFIX, hex_id)
}

struct GuidStream {
    buffer: Vec<u8>,
}

impl GuidStream {
    fn new(buffer: Vec<u8>) -> Self {
        Self { buffer }
    }

    fn get(&self, index: usize) -> Result<Uuid> {
        let start = index * 16;
        let slice = self.buffer.get(start..start + 16).ok_or_else(|| {
            MsgError::InvalidFormat(format!("GUID stream has no entry {index}"))
        })?;
        Ok(parse_guid(slice))
    }
}

/// GUIDs are stored with the first three fields little-endian.
fn parse_guid(data: &[u8]) -> Uuid {
    Uuid::from_u128(u128::from_be_bytes([
        data[3], data[2], data[1], data[0], data[5], data[4], data[7], data[6], data[8], data[9],
        data[10], data[11], data[12], data[13], data[14], data[15],
    ]))
}

struct StringStream {
    buffer: Vec<u8>,
}

impl StringStream {
    fn new(buffer: Vec<u8>) -> Self {
        Self { buffer }
    }

    /// Reads the length-prefixed UTF-16 name starting at `offset`.
    fn get(&self, offset: usize) -> Result<String> {
        let length_bytes = self.buffer.get(offset..offset + 4).ok_or_else(|| {
            MsgError::InvalidFormat(format!("string stream offset {offset} out of range"))
        })?;
        let length = u32::from_le_bytes([
            length_bytes[0],
            length_bytes[1],
            length_bytes[2],
            length_bytes[3],
        ]) as usize;
        let bytes = self
            .buffer
            .get(offset + 4..offset + 4 + length)
            .ok_or_else(|| {
                MsgError::InvalidFormat(format!(
                    "string stream entry at {offset} overruns the stream"
                ))
            })?;
        crate::properties::decode_unicode(bytes)
    }
}

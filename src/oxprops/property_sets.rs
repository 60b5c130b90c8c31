//! Property set GUIDs used when resolving named properties.

use uuid::Uuid;

/// The property sets this crate distinguishes when mapping named
/// properties. Sets outside the table are carried as `Other`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PropertySet {
    PublicStrings,
    Common,
    Address,
    InternetHeaders,
    Appointment,
    Meeting,
    Task,
    Note,
    PsMapi,
    Other(Uuid),
}

const PUBLIC_STRINGS: Uuid = Uuid::from_bytes([
    0x00, 0x02, 0x03, 0x29, 0x00, 0x00, 0x00, 0x00, 0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46,
]);
const COMMON: Uuid = Uuid::from_bytes([
    0x00, 0x06, 0x20, 0x08, 0x00, 0x00, 0x00, 0x00, 0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46,
]);
const ADDRESS: Uuid = Uuid::from_bytes([
    0x00, 0x06, 0x20, 0x04, 0x00, 0x00, 0x00, 0x00, 0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46,
]);
const INTERNET_HEADERS: Uuid = Uuid::from_bytes([
    0x00, 0x02, 0x03, 0x86, 0x00, 0x00, 0x00, 0x00, 0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46,
]);
const APPOINTMENT: Uuid = Uuid::from_bytes([
    0x00, 0x06, 0x20, 0x02, 0x00, 0x00, 0x00, 0x00, 0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46,
]);
const MEETING: Uuid = Uuid::from_bytes([
    0x6E, 0xD8, 0xDA, 0x90, 0x45, 0x0B, 0x10, 0x1B, 0x98, 0xDA, 0x00, 0xAA, 0x00, 0x3F, 0x13, 0x05,
]);
const TASK: Uuid = Uuid::from_bytes([
    0x00, 0x06, 0x20, 0x03, 0x00, 0x00, 0x00, 0x00, 0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46,
]);
const NOTE: Uuid = Uuid::from_bytes([
    0x00, 0x06, 0x20, 0x0E, 0x00, 0x00, 0x00, 0x00, 0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46,
]);
const PS_MAPI: Uuid = Uuid::from_bytes([
    0x00, 0x02, 0x03, 0x28, 0x00, 0x00, 0x00, 0x00, 0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46,
]);

impl PropertySet {
    pub fn from_uuid(uuid: Uuid) -> Self {
        match uuid {
            PUBLIC_STRINGS => Self::PublicStrings,
            COMMON => Self::Common,
            ADDRESS => Self::Address,
            INTERNET_HEADERS => Self::InternetHeaders,
            APPOINTMENT => Self::Appointment,
            MEETING => Self::Meeting,
            TASK => Self::Task,
            NOTE => Self::Note,
            PS_MAPI => Self::PsMapi,
            uuid => Self::Other(uuid),
        }
    }

    pub fn to_uuid(&self) -> Uuid {
        match self {
            Self::PublicStrings => PUBLIC_STRINGS,
            Self::Common => COMMON,
            Self::Address => ADDRESS,
            Self::InternetHeaders => INTERNET_HEADERS,
            Self::Appointment => APPOINTMENT,
            Self::Meeting => MEETING,
            Self::Task => TASK,
            Self::Note => NOTE,
            Self::PsMapi => PS_MAPI,
            Self::Other(uuid) => *uuid,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PublicStrings => "PS_PUBLIC_STRINGS",
            Self::Common => "PSETID_Common",
            Self::Address => "PSETID_Address",
            Self::InternetHeaders => "PS_INTERNET_HEADERS",
            Self::Appointment => "PSETID_Appointment",
            Self::Meeting => "PSETID_Meeting",
            Self::Task => "PSETID_Task",
            Self::Note => "PSETID_Note",
            Self::PsMapi => "PS_MAPI",
            Self::Other(_) => "Other",
        }
    }
}

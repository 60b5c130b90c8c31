//! Well-known property identifiers and storage naming conventions.
//!
//! Identifiers are the 16-bit property ids (the tag without its type code);
//! the type code is carried separately by the property stream records and
//! the `__substg1.0_` stream-name suffixes.

// Message scalars.
pub const PR_IMPORTANCE: u16 = 0x0017;
pub const PR_MESSAGE_CLASS: u16 = 0x001A;
pub const PR_SUBJECT: u16 = 0x0037;
pub const PR_CLIENT_SUBMIT_TIME: u16 = 0x0039;
pub const PR_PROVIDER_SUBMIT_TIME: u16 = 0x0048;
pub const PR_TRANSPORT_MESSAGE_HEADERS: u16 = 0x007D;
pub const PR_MESSAGE_DELIVERY_TIME: u16 = 0x0E06;
pub const PR_BODY: u16 = 0x1000;
pub const PR_RTF_COMPRESSED: u16 = 0x1009;
pub const PR_BODY_HTML: u16 = 0x1013;
pub const PR_INTERNET_MESSAGE_ID: u16 = 0x1035;
pub const PR_FLAG_STATUS: u16 = 0x1090;
pub const PR_INTERNET_CPID: u16 = 0x3FDE;

// Contact scalars.
pub const PR_BUSINESS_TELEPHONE_NUMBER: u16 = 0x3A08;
pub const PR_COMPANY_NAME: u16 = 0x3A16;
pub const PR_TITLE: u16 = 0x3A17;
pub const PR_CELLULAR_TELEPHONE_NUMBER: u16 = 0x3A1C;

// Named property LIDs, [MS-OXPROPS]. Each is scoped by its property set.
pub const LID_TASK_START_DATE: u32 = 0x8104;
pub const LID_TASK_DUE_DATE: u32 = 0x8105;
pub const LID_TASK_COMPLETE: u32 = 0x811C;
pub const LID_LOCATION: u32 = 0x8208;
pub const LID_APPOINTMENT_START: u32 = 0x820D;
pub const LID_APPOINTMENT_END: u32 = 0x820E;
pub const LID_FLAG_REQUEST: u32 = 0x8530;

// Sender.
pub const PR_SENDER_NAME: u16 = 0x0C1A;
pub const PR_SENDER_EMAIL_ADDRESS: u16 = 0x0C1F;

// Recipients.
pub const PR_RECIPIENT_TYPE: u16 = 0x0C15;
pub const PR_DISPLAY_NAME: u16 = 0x3001;
pub const PR_EMAIL_ADDRESS: u16 = 0x3003;
pub const PR_SMTP_ADDRESS: u16 = 0x39FE;

// Attachments.
pub const PR_ATTACH_DATA: u16 = 0x3701;
pub const PR_ATTACH_FILENAME: u16 = 0x3704;
pub const PR_ATTACH_METHOD: u16 = 0x3705;
pub const PR_ATTACH_LONG_FILENAME: u16 = 0x3707;
pub const PR_RENDERING_POSITION: u16 = 0x370B;
pub const PR_ATTACH_MIME_TAG: u16 = 0x370E;
pub const PR_ATTACH_CONTENT_ID: u16 = 0x3712;
pub const PR_ATTACHMENT_HIDDEN: u16 = 0x7FFE;

/// PR_ATTACH_METHOD value marking an embedded message attachment.
pub const ATTACH_EMBEDDED_MSG: i32 = 5;

/// Named property (PS_PUBLIC_STRINGS) holding the message categories.
pub const KEYWORDS: &str = "Keywords";

// Storage and stream naming conventions.
pub const RECIP_STORAGE_PREFIX: &str = "__recip_version1.0_#";
pub const ATTACH_STORAGE_PREFIX: &str = "__attach_version1.0_#";
pub const NAMEID_STORAGE: &str = "__nameid_version1.0";
pub const PROPERTIES_STREAM: &str = "__properties_version1.0";
pub const SUB_STG_PREFIX: &str = "__substg1.0_";

/// Storage holding an embedded message's own container
/// (PR_ATTACH_DATA with type PT_OBJECT).
pub const ATTACH_DATA_OBJECT_STORAGE: &str = "__substg1.0_3701000D";

// Property stream header sizes. A top-level message carries a 32-byte
// header, an embedded message 24 bytes, attachments and recipients 8.
pub const PROPERTIES_HEADER_TOP: usize = 32;
pub const PROPERTIES_HEADER_EMBEDDED: usize = 24;
pub const PROPERTIES_HEADER_ATTACH_OR_RECIP: usize = 8;

/// First and last identifiers of the named property range.
pub const NAMED_PROPERTY_START: u16 = 0x8000;
pub const NAMED_PROPERTY_END: u16 = 0xFFFE;

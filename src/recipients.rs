//! Recipients of a message, one `__recip_version1.0_#XXXXXXXX` storage each.

use serde::{Deserialize, Serialize};

use crate::address;
use crate::error::Result;
use crate::oxprops::tags;
use crate::properties::PropertyBag;
use crate::storage::Container;

/// PR_RECIPIENT_TYPE values, [MS-OXOMSG].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum RecipientKind {
    To,
    Cc,
    Bcc,
    Unknown,
}

impl RecipientKind {
    fn from_recipient_type(value: i32) -> Self {
        match value {
            1 => Self::To,
            2 => Self::Cc,
            3 => Self::Bcc,
            _ => Self::Unknown,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Recipient {
    pub display_name: String,
    pub email: String,
    pub kind: RecipientKind,
}

impl Recipient {
    /// Reads one recipient from its storage. Recipient property streams
    /// carry an 8-byte header.
    pub fn from_container(container: Container) -> Result<Self> {
        let bag = PropertyBag::new(container, tags::PROPERTIES_HEADER_ATTACH_OR_RECIP)?;

        // PR_SMTP_ADDRESS beats the address-book PR_EMAIL_ADDRESS.
        let email = match bag.string(tags::PR_SMTP_ADDRESS)? {
            Some(smtp) if !smtp.is_empty() => smtp,
            _ => bag.string(tags::PR_EMAIL_ADDRESS)?.unwrap_or_default(),
        };
        let display_name = bag.string(tags::PR_DISPLAY_NAME)?.unwrap_or_default();
        let kind = bag
            .int32(tags::PR_RECIPIENT_TYPE)?
            .map(RecipientKind::from_recipient_type)
            .unwrap_or(RecipientKind::Unknown);

        let (display_name, email) = address::normalize_pair(
            address::remove_single_quotes(&display_name),
            address::remove_single_quotes(&email),
        );
        Ok(Self {
            display_name,
            email,
            kind,
        })
    }

    /// RFC 822 mailbox form, `"Display Name" <address>`.
    pub fn rfc822(&self) -> String {
        address::rfc822_format(&self.display_name, &self.email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::PType;
    use std::io::{Cursor, Write};

    fn unicode(text: &str) -> Vec<u8> {
        text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
    }

    fn build(display_name: &str, email: &str, recipient_type: i32) -> Recipient {
        let mut cfb = cfb::CompoundFile::create(Cursor::new(Vec::new())).unwrap();

        let mut stream = vec![0u8; tags::PROPERTIES_HEADER_ATTACH_OR_RECIP];
        stream.extend_from_slice(&PType::Integer32.to_bits().to_le_bytes());
        stream.extend_from_slice(&tags::PR_RECIPIENT_TYPE.to_le_bytes());
        stream.extend_from_slice(&2u32.to_le_bytes());
        stream.extend_from_slice(&recipient_type.to_le_bytes());
        stream.extend_from_slice(&[0u8; 4]);
        cfb.create_stream(format!("/{}", tags::PROPERTIES_STREAM))
            .unwrap()
            .write_all(&stream)
            .unwrap();

        cfb.create_stream("/__substg1.0_3001001F")
            .unwrap()
            .write_all(&unicode(display_name))
            .unwrap();
        cfb.create_stream("/__substg1.0_39FE001F")
            .unwrap()
            .write_all(&unicode(email))
            .unwrap();
        cfb.flush().unwrap();

        let container = Container::open(cfb.into_inner().into_inner()).unwrap();
        Recipient::from_container(container).unwrap()
    }

    #[test]
    fn reads_kind_and_fields() {
        let recipient = build("Jane Doe", "jane@example.com", 1);
        assert_eq!(recipient.kind, RecipientKind::To);
        assert_eq!(recipient.display_name, "Jane Doe");
        assert_eq!(recipient.email, "jane@example.com");
        assert_eq!(recipient.rfc822(), "\"Jane Doe\" <jane@example.com>");
    }

    #[test]
    fn swapped_fields_are_normalized() {
        let recipient = build("jane@example.com", "Jane Doe", 2);
        assert_eq!(recipient.kind, RecipientKind::Cc);
        assert_eq!(recipient.display_name, "Jane Doe");
        assert_eq!(recipient.email, "jane@example.com");
    }

    #[test]
    fn unknown_recipient_type() {
        let recipient = build("x", "x@example.com", 9);
        assert_eq!(recipient.kind, RecipientKind::Unknown);
    }
}

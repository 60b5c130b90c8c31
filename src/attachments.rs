//! Leaf (non-message) attachments, one `__attach_version1.0_#XXXXXXXX`
//! storage each. Embedded message attachments are handled by the message
//! assembly itself; by the time an [`Attachment`] is built the storage is
//! known to hold plain data.

use serde::{Deserialize, Serialize};

use crate::address::sanitize_file_name;
use crate::error::Result;
use crate::mime::MimeAttachment;
use crate::oxprops::tags;
use crate::properties::PropertyBag;
use crate::storage::Container;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Attachment {
    pub file_name: String,
    pub data: Vec<u8>,
    pub mime_tag: Option<String>,
    pub content_id: Option<String>,
    pub rendering_position: Option<i32>,
    pub hidden: bool,
}

impl Attachment {
    /// Reads one attachment from its storage. Attachment property streams
    /// carry an 8-byte header.
    pub fn from_container(container: Container) -> Result<Self> {
        let bag = PropertyBag::new(container, tags::PROPERTIES_HEADER_ATTACH_OR_RECIP)?;

        let long_name = bag.string(tags::PR_ATTACH_LONG_FILENAME)?;
        let short_name = bag.string(tags::PR_ATTACH_FILENAME)?;
        let display_name = bag.string(tags::PR_DISPLAY_NAME)?;
        let file_name = long_name
            .or(short_name)
            .or(display_name)
            .unwrap_or_default();

        Ok(Self {
            file_name: sanitize_file_name(&file_name),
            data: bag.bytes(tags::PR_ATTACH_DATA)?.unwrap_or_default(),
            mime_tag: bag.string(tags::PR_ATTACH_MIME_TAG)?,
            content_id: bag.string(tags::PR_ATTACH_CONTENT_ID)?,
            rendering_position: bag.int32(tags::PR_RENDERING_POSITION)?,
            hidden: bag.boolean(tags::PR_ATTACHMENT_HIDDEN)?.unwrap_or(false),
        })
    }

    /// Adopts an attachment extracted from an unwrapped signed payload.
    pub fn from_mime(part: MimeAttachment) -> Self {
        Self {
            file_name: sanitize_file_name(&part.file_name),
            data: part.data,
            mime_tag: part.content_type,
            content_id: None,
            rendering_position: None,
            hidden: false,
        }
    }

    /// Inline attachments are referenced from the HTML body by content id
    /// and usually rendered, not listed.
    pub fn is_inline(&self) -> bool {
        self.content_id.is_some()
    }
}

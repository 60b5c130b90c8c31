//! Serializing a message back into a standalone compound container.

use std::io::{Cursor, Read, Write};
use std::path::Path;

use crate::error::{MsgError, Result};
use crate::message::Message;
use crate::oxprops::tags;

/// Bytes inserted when widening an embedded property stream header from 24
/// to 32 bytes.
const HEADER_PADDING: [u8; 8] = [0u8; 8];
const PADDING_OFFSET: usize = 24;

/// Writes the message's backing subtree into a fresh compound container and
/// returns its byte image. An embedded message becomes a standalone file:
/// it receives a copy of the top ancestor's named-property mapping storage
/// and its property stream header is widened to the top-level layout.
pub fn save(message: &Message) -> Result<Vec<u8>> {
    let mut dest = cfb::CompoundFile::create(Cursor::new(Vec::new()))?;
    message
        .container()
        .copy_subtree_into(&mut dest, Path::new("/"))?;

    if message.is_embedded() {
        copy_named_property_storage(message, &mut dest)?;
        widen_property_stream_header(&mut dest)?;
    }

    dest.flush()?;
    Ok(dest.into_inner().into_inner())
}

fn copy_named_property_storage(
    message: &Message,
    dest: &mut crate::storage::BackingFile,
) -> Result<()> {
    let top = message
        .container()
        .sibling(message.top_ancestor_path().to_path_buf());
    if !top.has_child(tags::NAMEID_STORAGE) {
        log::debug!("top ancestor has no named property storage, skipping copy");
        return Ok(());
    }
    let nameid = top.open_child_storage(tags::NAMEID_STORAGE)?;
    nameid.copy_subtree_into(dest, &Path::new("/").join(tags::NAMEID_STORAGE))
}

/// Destroys and recreates the property stream with 8 null bytes inserted
/// after offset 24, turning the embedded 24-byte header into the 32-byte
/// top-level one. Recreating rather than rewriting in place means a failure
/// can never leave a half-written stream behind.
fn widen_property_stream_header(dest: &mut crate::storage::BackingFile) -> Result<()> {
    let stream_path = Path::new("/").join(tags::PROPERTIES_STREAM);
    let mut bytes = Vec::new();
    dest.open_stream(&stream_path)?.read_to_end(&mut bytes)?;

    if bytes.len() < PADDING_OFFSET {
        return Err(MsgError::InvalidFormat(format!(
            "embedded property stream is only {} bytes",
            bytes.len()
        )));
    }
    let mut widened = Vec::with_capacity(bytes.len() + HEADER_PADDING.len());
    widened.extend_from_slice(&bytes[..PADDING_OFFSET]);
    widened.extend_from_slice(&HEADER_PADDING);
    widened.extend_from_slice(&bytes[PADDING_OFFSET..]);

    dest.remove_stream(&stream_path)?;
    dest.create_stream(&stream_path)?.write_all(&widened)?;
    Ok(())
}

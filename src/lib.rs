//! Reader and re-writer for Outlook `.msg` compound containers.
//!
//! A `.msg` file is an OLE compound file: a miniature filesystem of named
//! storages and streams. Message metadata lives in typed MAPI properties,
//! recipients and attachments in child storages, the RTF body in an LZ77
//! variant with a fixed dictionary seed, and signed messages wrap their
//! real content in a PKCS#7 envelope.
//!
//! ```no_run
//! use outlook_msg::Message;
//!
//! # fn main() -> outlook_msg::Result<()> {
//! let message = Message::from_file("mail.msg")?;
//! println!("{}", message.subject()?);
//! for recipient in message.recipients() {
//!     println!("  to {}", recipient.rfc822());
//! }
//! let standalone = outlook_msg::save(&message)?;
//! # let _ = standalone;
//! # Ok(())
//! # }
//! ```

mod address;
mod attachments;
mod entities;
mod error;
mod message;
mod mime;
mod named_props;
mod oxprops;
mod properties;
mod recipients;
mod rtf;
mod signed;
mod storage;
mod writer;

pub use attachments::Attachment;
pub use entities::{Appointment, Contact, Flag, FlagStatus, Task};
pub use error::{MsgError, Result};
pub use message::{Importance, Message, MessageAttachment, MessageType, Sender};
pub use mime::{HeaderAddress, MimeAttachment, MimeContent, TransportHeaders};
pub use named_props::{NamedProperty, NamedPropertyIdentifier, NamedPropertyMap};
pub use oxprops::property_sets::PropertySet;
pub use oxprops::tags;
pub use properties::{PType, PValue, PropertyBag, PropertyFlags, PropertyRecord};
pub use recipients::{Recipient, RecipientKind};
pub use rtf::decompress as decompress_rtf;
pub use signed::{unwrap as unwrap_signed, UnwrappedContent};
pub use storage::{ChildEntry, ChildKind, Container};
pub use writer::save;

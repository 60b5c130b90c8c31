//! Message assembly: the object graph behind one open `.msg` container.
//!
//! A [`Message`] is built once by walking its storage's children depth-first
//! (recipients, attachments, embedded messages) and is immutable afterwards,
//! except for derived fields which are computed on first access and memoized.

use std::cell::OnceCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address;
use crate::attachments::Attachment;
use crate::entities::{Appointment, Contact, Flag, Task};
use crate::error::{MsgError, Result};
use crate::mime::{self, TransportHeaders};
use crate::named_props::{self, NamedPropertyMap};
use crate::oxprops::tags;
use crate::properties::{decode_string8, decode_unicode, PType, PropertyBag};
use crate::recipients::{Recipient, RecipientKind};
use crate::rtf;
use crate::signed;
use crate::storage::{ChildKind, Container};

const FALLBACK_FILE_NAME: &str = "nameless";

/// Message classification derived from the PR_MESSAGE_CLASS name.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum MessageType {
    Email,
    SignedEmail,
    Appointment,
    AppointmentRequest,
    AppointmentResponse,
    Contact,
    Task,
    TaskRequestAccept,
    StickyNote,
    Unknown,
}

impl MessageType {
    /// Table-driven lookup over the class name, case-insensitive. Signed
    /// and meeting classes carry sub-class suffixes, so those match by
    /// prefix.
    pub fn from_class_name(class_name: &str) -> Self {
        let upper = class_name.trim().to_ascii_uppercase();
        if upper.starts_with("IPM.NOTE.SMIME") {
            return Self::SignedEmail;
        }
        if upper.starts_with("IPM.SCHEDULE.MEETING.REQUEST") {
            return Self::AppointmentRequest;
        }
        if upper.starts_with("IPM.SCHEDULE.MEETING.RESP") {
            return Self::AppointmentResponse;
        }
        match upper.as_str() {
            "IPM.NOTE" => Self::Email,
            "IPM.APPOINTMENT" => Self::Appointment,
            "IPM.CONTACT" => Self::Contact,
            "IPM.TASKREQUEST.ACCEPT" => Self::TaskRequestAccept,
            "IPM.TASK" => Self::Task,
            "IPM.STICKYNOTE" => Self::StickyNote,
            _ => Self::Unknown,
        }
    }
}

/// PR_IMPORTANCE, defaulting to `Normal` when absent or out of range.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum Importance {
    Low,
    #[default]
    Normal,
    High,
}

impl Importance {
    fn from_property(value: Option<i32>) -> Self {
        match value {
            Some(0) => Self::Low,
            Some(2) => Self::High,
            _ => Self::Normal,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Sender {
    pub display_name: String,
    pub email: String,
}

impl Sender {
    pub fn rfc822(&self) -> String {
        address::rfc822_format(&self.display_name, &self.email)
    }
}

/// One entry of a message's attachment list.
pub enum MessageAttachment {
    File(Attachment),
    /// An embedded message, assembled recursively. The rendering position
    /// places it inside the parent's RTF body.
    Embedded {
        message: Box<Message>,
        rendering_position: Option<i32>,
    },
}

/// Shared state passed down when assembling an embedded message.
struct AssemblyContext {
    named: Rc<NamedPropertyMap>,
    top_ancestor_path: PathBuf,
    parent_path: PathBuf,
}

pub struct Message {
    container: Container,
    bag: PropertyBag,
    message_type: MessageType,
    headers: Option<TransportHeaders>,
    sender: Option<Sender>,
    recipients: Vec<Recipient>,
    attachments: Vec<MessageAttachment>,
    named: Rc<NamedPropertyMap>,
    /// Storage path of the top-most ancestor message. Non-owning: paths
    /// into the shared backing file, not handles.
    top_ancestor_path: PathBuf,
    parent_path: Option<PathBuf>,
    signature_valid: Option<bool>,
    signed_body_text: Option<String>,
    signed_body_html: Option<String>,
    subject: OnceCell<String>,
    sent_on: OnceCell<Option<DateTime<Utc>>>,
    received_on: OnceCell<Option<DateTime<Utc>>>,
    importance: OnceCell<Importance>,
    body_text: OnceCell<Option<String>>,
    body_rtf: OnceCell<Option<String>>,
    body_html: OnceCell<Option<String>>,
    categories: OnceCell<Option<Vec<String>>>,
    internet_message_id: OnceCell<Option<String>>,
    appointment: OnceCell<Option<Appointment>>,
    task: OnceCell<Option<Task>>,
    contact: OnceCell<Option<Contact>>,
    flag: OnceCell<Option<Flag>>,
}

impl Message {
    /// Opens and assembles a top-level message from its container bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::assemble(Container::open(bytes)?, tags::PROPERTIES_HEADER_TOP, None)
    }

    /// Opens and assembles a top-level message from a `.msg` file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::assemble(
            Container::from_file(path)?,
            tags::PROPERTIES_HEADER_TOP,
            None,
        )
    }

    fn assemble(
        container: Container,
        header_size: usize,
        context: Option<&AssemblyContext>,
    ) -> Result<Self> {
        let bag = PropertyBag::new(container.clone(), header_size)?;
        let class_name = bag.string(tags::PR_MESSAGE_CLASS)?.unwrap_or_default();
        let message_type = MessageType::from_class_name(&class_name);
        log::debug!(
            "assembling {:?} as {message_type:?} (class {class_name:?})",
            container.path()
        );

        // Embedded messages reuse the top ancestor's resolved map.
        let named = match context {
            Some(context) => Rc::clone(&context.named),
            None => Rc::new(resolve_named_properties(&container, &bag)?),
        };
        let (top_ancestor_path, parent_path) = match context {
            Some(context) => (
                context.top_ancestor_path.clone(),
                Some(context.parent_path.clone()),
            ),
            None => (container.path().to_path_buf(), None),
        };

        let headers = bag
            .string(tags::PR_TRANSPORT_MESSAGE_HEADERS)?
            .and_then(|text| mime::parse_transport_headers(&text));
        let sender = read_sender(&bag, headers.as_ref())?;

        let mut recipients = Vec::new();
        let mut attachments = Vec::new();
        let mut signature_valid = None;
        let mut signed_body_text = None;
        let mut signed_body_html = None;

        for child in container.list_children()? {
            if child.kind != ChildKind::Storage {
                continue;
            }
            if child.name.starts_with(tags::RECIP_STORAGE_PREFIX) {
                let storage = container.open_child_storage(&child.name)?;
                recipients.push(Recipient::from_container(storage)?);
            } else if child.name.starts_with(tags::ATTACH_STORAGE_PREFIX) {
                let storage = container.open_child_storage(&child.name)?;
                if message_type == MessageType::SignedEmail {
                    // The single attachment is the signed envelope; its
                    // content becomes this message's bodies and attachments.
                    let envelope_bag =
                        PropertyBag::new(storage, tags::PROPERTIES_HEADER_ATTACH_OR_RECIP)?;
                    let envelope =
                        envelope_bag.bytes(tags::PR_ATTACH_DATA)?.ok_or_else(|| {
                            MsgError::InvalidFormat(
                                "signed message attachment carries no envelope data".to_string(),
                            )
                        })?;
                    let unwrapped = signed::unwrap(&envelope)?;
                    signature_valid = Some(unwrapped.signature_valid);
                    if let Some(content) = mime::parse_mime_message(&unwrapped.content) {
                        signed_body_text = content.body_text;
                        signed_body_html = content.body_html;
                        for part in content.attachments {
                            attachments.push(MessageAttachment::File(Attachment::from_mime(part)));
                        }
                    }
                } else {
                    let attach_bag = PropertyBag::new(
                        storage.clone(),
                        tags::PROPERTIES_HEADER_ATTACH_OR_RECIP,
                    )?;
                    let method = attach_bag.int32(tags::PR_ATTACH_METHOD)?.unwrap_or(0);
                    if method == tags::ATTACH_EMBEDDED_MSG {
                        let nested =
                            storage.open_child_storage(tags::ATTACH_DATA_OBJECT_STORAGE)?;
                        let nested_context = AssemblyContext {
                            named: Rc::clone(&named),
                            top_ancestor_path: top_ancestor_path.clone(),
                            parent_path: container.path().to_path_buf(),
                        };
                        let message = Self::assemble(
                            nested,
                            tags::PROPERTIES_HEADER_EMBEDDED,
                            Some(&nested_context),
                        )?;
                        attachments.push(MessageAttachment::Embedded {
                            message: Box::new(message),
                            rendering_position: attach_bag.int32(tags::PR_RENDERING_POSITION)?,
                        });
                    } else {
                        attachments.push(MessageAttachment::File(Attachment::from_container(
                            storage,
                        )?));
                    }
                }
            }
        }

        Ok(Self {
            container,
            bag,
            message_type,
            headers,
            sender,
            recipients,
            attachments,
            named,
            top_ancestor_path,
            parent_path,
            signature_valid,
            signed_body_text,
            signed_body_html,
            subject: OnceCell::new(),
            sent_on: OnceCell::new(),
            received_on: OnceCell::new(),
            importance: OnceCell::new(),
            body_text: OnceCell::new(),
            body_rtf: OnceCell::new(),
            body_html: OnceCell::new(),
            categories: OnceCell::new(),
            internet_message_id: OnceCell::new(),
            appointment: OnceCell::new(),
            task: OnceCell::new(),
            contact: OnceCell::new(),
            flag: OnceCell::new(),
        })
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub fn sender(&self) -> Option<&Sender> {
        self.sender.as_ref()
    }

    /// RFC 822 form of the sender, e.g. `"Pan, P (Peter)"
    /// <Peter.Pan@neverland.com>`.
    pub fn sender_rfc822(&self) -> Option<String> {
        self.sender.as_ref().map(Sender::rfc822)
    }

    pub fn recipients(&self) -> &[Recipient] {
        &self.recipients
    }

    /// Recipients of one kind. When no recipient storage of that kind
    /// exists, falls back to the transport headers.
    pub fn recipients_of_kind(&self, kind: RecipientKind) -> Vec<Recipient> {
        let stored: Vec<Recipient> = self
            .recipients
            .iter()
            .filter(|recipient| recipient.kind == kind)
            .cloned()
            .collect();
        if stored.is_empty() {
            return self.header_recipients(kind);
        }
        stored
    }

    /// Recipients of one kind, RFC 822 formatted and joined with `; `.
    pub fn recipients_rfc822(&self, kind: RecipientKind) -> String {
        self.recipients_of_kind(kind)
            .iter()
            .map(Recipient::rfc822)
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn header_recipients(&self, kind: RecipientKind) -> Vec<Recipient> {
        let Some(headers) = self.headers.as_ref() else {
            return Vec::new();
        };
        let addresses = match kind {
            RecipientKind::To => &headers.to,
            RecipientKind::Cc => &headers.cc,
            RecipientKind::Bcc => &headers.bcc,
            RecipientKind::Unknown => return Vec::new(),
        };
        addresses
            .iter()
            .map(|address| {
                let (display_name, email) =
                    address::normalize_pair(&address.display_name, &address.address);
                Recipient {
                    display_name,
                    email,
                    kind,
                }
            })
            .collect()
    }

    pub fn attachments(&self) -> &[MessageAttachment] {
        &self.attachments
    }

    /// File names of all attachments; embedded messages contribute their
    /// derived file name.
    pub fn attachment_names(&self) -> Result<Vec<String>> {
        self.attachments
            .iter()
            .map(|attachment| match attachment {
                MessageAttachment::File(file) => Ok(file.file_name.clone()),
                MessageAttachment::Embedded { message, .. } => message.file_name(),
            })
            .collect()
    }

    pub fn transport_headers(&self) -> Option<&TransportHeaders> {
        self.headers.as_ref()
    }

    pub fn named_properties(&self) -> &NamedPropertyMap {
        &self.named
    }

    /// Outcome of signature verification, for signed messages only.
    pub fn signature_valid(&self) -> Option<bool> {
        self.signature_valid
    }

    pub fn subject(&self) -> Result<String> {
        memoize(&self.subject, || {
            Ok(self.bag.string(tags::PR_SUBJECT)?.unwrap_or_default())
        })
        .cloned()
    }

    /// Filesystem-safe name for saving this message, derived from the
    /// subject.
    pub fn file_name(&self) -> Result<String> {
        let subject = self.subject()?;
        let mut base = address::sanitize_file_name(&subject);
        if base.is_empty() {
            base = FALLBACK_FILE_NAME.to_string();
        }
        Ok(format!("{base}.msg"))
    }

    /// When the message was submitted, falling back to the transport
    /// header date.
    pub fn sent_on(&self) -> Result<Option<DateTime<Utc>>> {
        memoize(&self.sent_on, || {
            if let Some(time) = self.bag.datetime(tags::PR_PROVIDER_SUBMIT_TIME)? {
                return Ok(Some(time));
            }
            if let Some(time) = self.bag.datetime(tags::PR_CLIENT_SUBMIT_TIME)? {
                return Ok(Some(time));
            }
            Ok(self.headers.as_ref().and_then(|headers| headers.date_sent))
        })
        .copied()
    }

    /// When the message was delivered, falling back to the most recent
    /// Received trace line.
    pub fn received_on(&self) -> Result<Option<DateTime<Utc>>> {
        memoize(&self.received_on, || {
            if let Some(time) = self.bag.datetime(tags::PR_MESSAGE_DELIVERY_TIME)? {
                return Ok(Some(time));
            }
            Ok(self
                .headers
                .as_ref()
                .and_then(|headers| headers.received_dates.first().copied()))
        })
        .copied()
    }

    pub fn importance(&self) -> Result<Importance> {
        memoize(&self.importance, || {
            Ok(Importance::from_property(
                self.bag.int32(tags::PR_IMPORTANCE)?,
            ))
        })
        .copied()
    }

    pub fn body_text(&self) -> Result<Option<String>> {
        memoize(&self.body_text, || {
            if let Some(text) = self.bag.string(tags::PR_BODY)? {
                return Ok(Some(text));
            }
            Ok(self.signed_body_text.clone())
        })
        .cloned()
    }

    /// The RTF body, decompressed on first access.
    pub fn body_rtf(&self) -> Result<Option<String>> {
        memoize(&self.body_rtf, || {
            let Some(compressed) = self.bag.bytes(tags::PR_RTF_COMPRESSED)? else {
                return Ok(None);
            };
            let bytes = rtf::decompress(&compressed)?;
            Ok(Some(decode_string8(&bytes)))
        })
        .cloned()
    }

    /// The HTML body. Falls back to HTML encapsulated in the RTF body,
    /// then to the unwrapped signed content.
    pub fn body_html(&self) -> Result<Option<String>> {
        memoize(&self.body_html, || {
            if let Some((ptype, bytes)) = self.bag.raw_value(tags::PR_BODY_HTML)? {
                let html = match ptype {
                    PType::String => decode_unicode(&bytes)?,
                    _ => self.decode_with_codepage(&bytes)?,
                };
                return Ok(Some(html));
            }
            if let Some(rtf_text) = self.body_rtf()? {
                if let Some(html) = rtf::extract_encapsulated_html(&rtf_text) {
                    return Ok(Some(html));
                }
            }
            Ok(self.signed_body_html.clone())
        })
        .cloned()
    }

    /// The Keywords named property, when the message carries one.
    pub fn categories(&self) -> Result<Option<Vec<String>>> {
        memoize(&self.categories, || {
            let Some(id) = self.named.id_of_name(tags::KEYWORDS) else {
                return Ok(None);
            };
            self.bag.string_list(id)
        })
        .cloned()
    }

    pub fn internet_message_id(&self) -> Result<Option<String>> {
        memoize(&self.internet_message_id, || {
            self.bag.string(tags::PR_INTERNET_MESSAGE_ID)
        })
        .cloned()
    }

    /// Calendar details, for appointment and meeting messages only.
    pub fn appointment(&self) -> Result<Option<Appointment>> {
        memoize(&self.appointment, || {
            if !matches!(
                self.message_type,
                MessageType::Appointment
                    | MessageType::AppointmentRequest
                    | MessageType::AppointmentResponse
            ) {
                return Ok(None);
            }
            Appointment::read(&self.bag, &self.named).map(Some)
        })
        .cloned()
    }

    /// Task details, for task messages only.
    pub fn task(&self) -> Result<Option<Task>> {
        memoize(&self.task, || {
            if !matches!(
                self.message_type,
                MessageType::Task | MessageType::TaskRequestAccept
            ) {
                return Ok(None);
            }
            Task::read(&self.bag, &self.named).map(Some)
        })
        .cloned()
    }

    /// Contact card details, for contact messages only.
    pub fn contact(&self) -> Result<Option<Contact>> {
        memoize(&self.contact, || {
            if self.message_type != MessageType::Contact {
                return Ok(None);
            }
            Contact::read(&self.bag).map(Some)
        })
        .cloned()
    }

    /// The follow-up flag, when the message carries one.
    pub fn flag(&self) -> Result<Option<Flag>> {
        memoize(&self.flag, || {
            let flag = Flag::read(&self.bag, &self.named)?;
            Ok(if flag.is_empty() { None } else { Some(flag) })
        })
        .cloned()
    }

    /// True when this message was assembled as an embedded attachment of
    /// another message.
    pub fn is_embedded(&self) -> bool {
        self.parent_path.is_some()
    }

    pub(crate) fn container(&self) -> &Container {
        &self.container
    }

    pub(crate) fn top_ancestor_path(&self) -> &Path {
        &self.top_ancestor_path
    }

    /// 8-bit bodies are interpreted in the code page PR_INTERNET_CPID
    /// names, when present and known.
    fn decode_with_codepage(&self, bytes: &[u8]) -> Result<String> {
        let encoding = self
            .bag
            .int32(tags::PR_INTERNET_CPID)?
            .and_then(|cpid| u16::try_from(cpid).ok())
            .and_then(codepage::to_encoding);
        match encoding {
            Some(encoding) => {
                let (decoded, _, _) = encoding.decode(bytes);
                Ok(decoded.trim_end_matches('\0').to_string())
            }
            None => Ok(decode_string8(bytes)),
        }
    }
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message")
            .field("path", &self.container.path())
            .field("message_type", &self.message_type)
            .field("recipients", &self.recipients.len())
            .field("attachments", &self.attachments.len())
            .finish()
    }
}

fn memoize<'a, T>(cell: &'a OnceCell<T>, compute: impl FnOnce() -> Result<T>) -> Result<&'a T> {
    if let Some(value) = cell.get() {
        return Ok(value);
    }
    let value = compute()?;
    Ok(cell.get_or_init(|| value))
}

/// Gathers and resolves named property candidates for a top-level message.
/// Candidates without a mapping storage are a format violation.
fn resolve_named_properties(container: &Container, bag: &PropertyBag) -> Result<NamedPropertyMap> {
    let children = container.list_children()?;
    let stream = bag.raw_property_stream()?;
    let candidates =
        named_props::gather_candidates(&children, stream.as_deref(), bag.header_size());
    if candidates.is_empty() {
        return Ok(NamedPropertyMap::default());
    }
    match container.open_child_storage(tags::NAMEID_STORAGE) {
        Ok(nameid) => named_props::resolve(&nameid, &candidates),
        Err(MsgError::NotFound(_)) => Err(MsgError::InvalidFormat(
            "message carries named properties but no mapping storage".to_string(),
        )),
        Err(err) => Err(err),
    }
}

fn read_sender(bag: &PropertyBag, headers: Option<&TransportHeaders>) -> Result<Option<Sender>> {
    let mut name = bag.string(tags::PR_SENDER_NAME)?.unwrap_or_default();
    let mut email = bag
        .string(tags::PR_SENDER_EMAIL_ADDRESS)?
        .unwrap_or_default();
    if name.is_empty() && email.is_empty() {
        if let Some(from) = headers.and_then(|headers| headers.from.as_ref()) {
            name = from.display_name.clone();
            email = from.address.clone();
        }
    }
    if name.is_empty() && email.is_empty() {
        return Ok(None);
    }
    let (display_name, email) = address::normalize_pair(
        address::remove_single_quotes(&name),
        address::remove_single_quotes(&email),
    );
    Ok(Some(Sender {
        display_name,
        email,
    }))
}

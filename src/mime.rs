//! Collaborator boundary: transport header and MIME message parsing.
//!
//! The container core treats both as black boxes: raw header text in,
//! structured fields out; raw MIME bytes in, bodies plus a flat attachment
//! list out. Failures here mean "headers unavailable", never a fatal
//! assembly error.

use chrono::{DateTime, Utc};
use mail_parser::{MessageParser, MimeHeaders};
use serde::{Deserialize, Serialize};

/// One mailbox taken from a transport header.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderAddress {
    pub display_name: String,
    pub address: String,
}

/// Structured view of the RFC 822 transport headers carried in
/// PR_TRANSPORT_MESSAGE_HEADERS.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TransportHeaders {
    pub from: Option<HeaderAddress>,
    pub to: Vec<HeaderAddress>,
    pub cc: Vec<HeaderAddress>,
    pub bcc: Vec<HeaderAddress>,
    pub date_sent: Option<DateTime<Utc>>,
    /// Dates of the Received trace lines, most recent hop first.
    pub received_dates: Vec<DateTime<Utc>>,
}

/// Parses raw transport header text. Returns `None` when the text yields
/// nothing usable.
pub fn parse_transport_headers(text: &str) -> Option<TransportHeaders> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    // Terminate the header block so the parser sees a complete message.
    let raw = format!("{trimmed}\r\n\r\n");
    let message = MessageParser::default().parse(raw.as_bytes())?;

    let headers = TransportHeaders {
        from: message.from().and_then(first_address),
        to: message.to().map(flatten_addresses).unwrap_or_default(),
        cc: message.cc().map(flatten_addresses).unwrap_or_default(),
        bcc: message.bcc().map(flatten_addresses).unwrap_or_default(),
        date_sent: message
            .date()
            .and_then(|date| DateTime::from_timestamp(date.to_timestamp(), 0)),
        received_dates: received_dates(trimmed),
    };
    Some(headers)
}

fn first_address(address: &mail_parser::Address<'_>) -> Option<HeaderAddress> {
    flatten_addresses(address).into_iter().next()
}

fn flatten_addresses(address: &mail_parser::Address<'_>) -> Vec<HeaderAddress> {
    let convert = |addr: &mail_parser::Addr<'_>| HeaderAddress {
        display_name: addr.name.as_deref().unwrap_or_default().to_string(),
        address: addr.address.as_deref().unwrap_or_default().to_string(),
    };
    match address {
        mail_parser::Address::List(list) => list.iter().map(convert).collect(),
        mail_parser::Address::Group(groups) => groups
            .iter()
            .flat_map(|group| group.addresses.iter().map(convert))
            .collect(),
    }
}

/// Pulls the date out of each `Received:` trace line (the part after the
/// last semicolon, RFC 2822 format).
fn received_dates(header_text: &str) -> Vec<DateTime<Utc>> {
    unfold_headers(header_text)
        .into_iter()
        .filter(|(name, _)| name == "received")
        .filter_map(|(_, value)| {
            let date_part = value.rsplit(';').next()?;
            DateTime::parse_from_rfc2822(date_part.trim())
                .ok()
                .map(|date| date.with_timezone(&Utc))
        })
        .collect()
}

/// Joins folded continuation lines, returning `(lowercase name, value)`
/// pairs.
fn unfold_headers(text: &str) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = Vec::new();
    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = result.last_mut() {
                last.1.push(' ');
                last.1.push_str(line.trim());
            }
        } else if let Some(colon) = line.find(':') {
            result.push((
                line[..colon].trim().to_ascii_lowercase(),
                line[colon + 1..].trim().to_string(),
            ));
        }
    }
    result
}

/// One attachment extracted from a MIME message.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MimeAttachment {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// Bodies and flat attachment list of a parsed MIME message.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MimeContent {
    pub body_text: Option<String>,
    pub body_html: Option<String>,
    pub attachments: Vec<MimeAttachment>,
}

/// Parses a complete MIME message (the content of an unwrapped signed
/// envelope). Returns `None` when the bytes are not parseable as MIME.
pub fn parse_mime_message(bytes: &[u8]) -> Option<MimeContent> {
    let message = MessageParser::default().parse(bytes)?;

    let attachments = message
        .attachments()
        .enumerate()
        .map(|(index, part)| {
            let content_type = part.content_type().map(|ct| match ct.subtype() {
                Some(subtype) => format!("{}/{}", ct.ctype(), subtype),
                None => ct.ctype().to_string(),
            });
            MimeAttachment {
                file_name: part
                    .attachment_name()
                    .map(String::from)
                    .unwrap_or_else(|| format!("attachment_{index}")),
                content_type,
                data: part.contents().to_vec(),
            }
        })
        .collect();

    Some(MimeContent {
        body_text: message.body_text(0).map(|text| text.into_owned()),
        body_html: message.body_html(0).map(|html| html.into_owned()),
        attachments,
    })
}

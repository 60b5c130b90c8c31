//! End-to-end assembly and save tests over synthetic containers.

use std::io::{Cursor, Seek, Write};

use outlook_msg::{
    tags, Container, FlagStatus, Importance, Message, MessageAttachment, MessageType, MsgError,
    PropertySet, RecipientKind,
};

type Builder = cfb::CompoundFile<Cursor<Vec<u8>>>;

fn unicode(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(|unit| unit.to_le_bytes()).collect()
}

fn write_stream(cfb: &mut Builder, path: &str, bytes: &[u8]) {
    cfb.create_stream(path).unwrap().write_all(bytes).unwrap();
}

fn record(type_bits: u16, id: u16, payload: [u8; 8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(16);
    bytes.extend_from_slice(&type_bits.to_le_bytes());
    bytes.extend_from_slice(&id.to_le_bytes());
    bytes.extend_from_slice(&2u32.to_le_bytes());
    bytes.extend_from_slice(&payload);
    bytes
}

fn filetime(unix_secs: i64) -> [u8; 8] {
    ((unix_secs + 11_644_473_600) * 10_000_000).to_le_bytes()
}

fn int32_payload(value: i32) -> [u8; 8] {
    let mut payload = [0u8; 8];
    payload[..4].copy_from_slice(&value.to_le_bytes());
    payload
}

fn add_recipient(cfb: &mut Builder, index: u32, name: &str, email: &str, kind: i32) {
    let base = format!("/{}{index:08X}", tags::RECIP_STORAGE_PREFIX);
    cfb.create_storage(&base).unwrap();
    let mut props = vec![0u8; tags::PROPERTIES_HEADER_ATTACH_OR_RECIP];
    props.extend(record(0x0003, tags::PR_RECIPIENT_TYPE, int32_payload(kind)));
    write_stream(cfb, &format!("{base}/{}", tags::PROPERTIES_STREAM), &props);
    write_stream(cfb, &format!("{base}/__substg1.0_3001001F"), &unicode(name));
    write_stream(cfb, &format!("{base}/__substg1.0_39FE001F"), &unicode(email));
}

fn add_file_attachment(cfb: &mut Builder, index: u32, file_name: &str, data: &[u8]) {
    let base = format!("/{}{index:08X}", tags::ATTACH_STORAGE_PREFIX);
    cfb.create_storage(&base).unwrap();
    let mut props = vec![0u8; tags::PROPERTIES_HEADER_ATTACH_OR_RECIP];
    props.extend(record(0x0003, tags::PR_ATTACH_METHOD, int32_payload(1)));
    write_stream(cfb, &format!("{base}/{}", tags::PROPERTIES_STREAM), &props);
    write_stream(
        cfb,
        &format!("{base}/__substg1.0_3707001F"),
        &unicode(file_name),
    );
    write_stream(cfb, &format!("{base}/__substg1.0_37010102"), data);
}

fn finish(mut cfb: Builder) -> Vec<u8> {
    cfb.flush().unwrap();
    let mut cursor = cfb.into_inner();
    cursor.rewind().unwrap();
    cursor.into_inner()
}

fn basic_email() -> Vec<u8> {
    let mut cfb = cfb::CompoundFile::create(Cursor::new(Vec::new())).unwrap();
    write_stream(&mut cfb, "/__substg1.0_001A001F", &unicode("IPM.Note"));
    write_stream(
        &mut cfb,
        "/__substg1.0_0037001F",
        &unicode("Quarterly results"),
    );
    write_stream(&mut cfb, "/__substg1.0_1000001F", &unicode("See attached."));
    write_stream(
        &mut cfb,
        "/__substg1.0_0C1A001F",
        &unicode("Art Vandelay"),
    );
    write_stream(
        &mut cfb,
        "/__substg1.0_0C1F001F",
        &unicode("art@vandelay.com"),
    );

    let mut props = vec![0u8; tags::PROPERTIES_HEADER_TOP];
    props.extend(record(0x0003, tags::PR_IMPORTANCE, int32_payload(2)));
    props.extend(record(
        0x0040,
        tags::PR_CLIENT_SUBMIT_TIME,
        filetime(1_600_000_000),
    ));
    write_stream(&mut cfb, &format!("/{}", tags::PROPERTIES_STREAM), &props);

    add_recipient(&mut cfb, 0, "Jane Doe", "jane@example.com", 1);
    add_recipient(&mut cfb, 1, "cc@example.com", "cc@example.com", 2);
    add_file_attachment(&mut cfb, 0, "report.pdf", &[1, 2, 3, 4]);
    finish(cfb)
}

#[test]
fn assembles_a_basic_email() {
    let message = Message::from_bytes(basic_email()).unwrap();
    assert_eq!(message.message_type(), MessageType::Email);
    assert_eq!(message.subject().unwrap(), "Quarterly results");
    assert_eq!(message.file_name().unwrap(), "Quarterly results.msg");
    assert_eq!(
        message.body_text().unwrap().as_deref(),
        Some("See attached.")
    );
    assert_eq!(message.importance().unwrap(), Importance::High);
    assert_eq!(
        message.sent_on().unwrap().map(|time| time.timestamp()),
        Some(1_600_000_000)
    );

    assert_eq!(message.recipients().len(), 2);
    assert_eq!(
        message.recipients_rfc822(RecipientKind::To),
        "\"Jane Doe\" <jane@example.com>"
    );
    assert_eq!(
        message.recipients_rfc822(RecipientKind::Cc),
        "<cc@example.com>"
    );

    assert_eq!(
        message.sender_rfc822().as_deref(),
        Some("\"Art Vandelay\" <art@vandelay.com>")
    );
    assert_eq!(
        message.attachment_names().unwrap(),
        vec!["report.pdf".to_string()]
    );
    assert!(!message.is_embedded());
}

#[test]
fn garbage_input_is_a_format_error() {
    assert!(matches!(
        Message::from_bytes(vec![0u8; 128]).unwrap_err(),
        MsgError::Format(_)
    ));
}

#[test]
fn importance_defaults_to_normal_and_sent_on_uses_header_date() {
    let mut cfb = cfb::CompoundFile::create(Cursor::new(Vec::new())).unwrap();
    write_stream(&mut cfb, "/__substg1.0_001A001F", &unicode("IPM.Note"));
    write_stream(
        &mut cfb,
        "/__substg1.0_007D001F",
        &unicode(
            "From: a@example.com\r\n\
             Date: Sat, 20 Nov 2021 14:22:01 -0800\r\n\
             Received: from mx by mail; Sat, 20 Nov 2021 14:22:03 -0800\r\n",
        ),
    );
    write_stream(
        &mut cfb,
        &format!("/{}", tags::PROPERTIES_STREAM),
        &vec![0u8; tags::PROPERTIES_HEADER_TOP],
    );

    let message = Message::from_bytes(finish(cfb)).unwrap();
    assert_eq!(message.importance().unwrap(), Importance::Normal);
    assert_eq!(
        message.sent_on().unwrap().map(|time| time.timestamp()),
        Some(1_637_446_921)
    );
    assert_eq!(
        message.received_on().unwrap().map(|time| time.timestamp()),
        Some(1_637_446_923)
    );
}

#[test]
fn unknown_class_yields_unknown_type() {
    let mut cfb = cfb::CompoundFile::create(Cursor::new(Vec::new())).unwrap();
    write_stream(&mut cfb, "/__substg1.0_001A001F", &unicode("IPM.Surprise"));
    let message = Message::from_bytes(finish(cfb)).unwrap();
    assert_eq!(message.message_type(), MessageType::Unknown);
}

#[test]
fn save_round_trips_a_top_level_message() {
    let original = Message::from_bytes(basic_email()).unwrap();
    let saved = outlook_msg::save(&original).unwrap();
    let reloaded = Message::from_bytes(saved).unwrap();

    assert_eq!(reloaded.subject().unwrap(), original.subject().unwrap());
    assert_eq!(reloaded.body_text().unwrap(), original.body_text().unwrap());
    let pairs = |message: &Message| {
        message
            .recipients()
            .iter()
            .map(|recipient| (recipient.email.clone(), recipient.kind))
            .collect::<Vec<_>>()
    };
    assert_eq!(pairs(&reloaded), pairs(&original));
    assert_eq!(
        reloaded.attachment_names().unwrap(),
        original.attachment_names().unwrap()
    );
}

/// Outer email with one embedded message attachment plus a named-property
/// mapping storage (Keywords on the outer message).
fn email_with_embedded_message() -> Vec<u8> {
    let mut cfb = cfb::CompoundFile::create(Cursor::new(Vec::new())).unwrap();
    write_stream(&mut cfb, "/__substg1.0_001A001F", &unicode("IPM.Note"));
    write_stream(&mut cfb, "/__substg1.0_0037001F", &unicode("Forwarding"));
    write_stream(
        &mut cfb,
        &format!("/{}", tags::PROPERTIES_STREAM),
        &vec![0u8; tags::PROPERTIES_HEADER_TOP],
    );

    // Keywords as named property 0x8005.
    write_stream(
        &mut cfb,
        "/__substg1.0_8005101F",
        &8u32.to_le_bytes(),
    );
    for (index, keyword) in ["urgent", "internal"].iter().enumerate() {
        write_stream(
            &mut cfb,
            &format!("/__substg1.0_8005101F-{index:08X}"),
            &unicode(keyword),
        );
    }
    let nameid = format!("/{}", tags::NAMEID_STORAGE);
    cfb.create_storage(&nameid).unwrap();
    write_stream(&mut cfb, &format!("{nameid}/__substg1.0_00020102"), &[0u8; 16]);
    let name = unicode(tags::KEYWORDS);
    let mut string_stream = (name.len() as u32).to_le_bytes().to_vec();
    string_stream.extend_from_slice(&name);
    write_stream(
        &mut cfb,
        &format!("{nameid}/__substg1.0_00040102"),
        &string_stream,
    );
    // Entry: string name at offset 0, GUID stream index 0, property index 5.
    let mut entry = 0u32.to_le_bytes().to_vec();
    entry.extend_from_slice(&((3u16 << 1) | 1).to_le_bytes());
    entry.extend_from_slice(&5u16.to_le_bytes());
    write_stream(&mut cfb, &format!("{nameid}/__substg1.0_00030102"), &entry);

    // Embedded message attachment.
    let base = format!("/{}00000000", tags::ATTACH_STORAGE_PREFIX);
    cfb.create_storage(&base).unwrap();
    let mut props = vec![0u8; tags::PROPERTIES_HEADER_ATTACH_OR_RECIP];
    props.extend(record(0x0003, tags::PR_ATTACH_METHOD, int32_payload(5)));
    props.extend(record(0x0003, tags::PR_RENDERING_POSITION, int32_payload(42)));
    write_stream(&mut cfb, &format!("{base}/{}", tags::PROPERTIES_STREAM), &props);

    let nested = format!("{base}/{}", tags::ATTACH_DATA_OBJECT_STORAGE);
    cfb.create_storage(&nested).unwrap();
    write_stream(
        &mut cfb,
        &format!("{nested}/__substg1.0_001A001F"),
        &unicode("IPM.Note"),
    );
    write_stream(
        &mut cfb,
        &format!("{nested}/__substg1.0_0037001F"),
        &unicode("Inner subject"),
    );
    let mut nested_props = vec![0u8; tags::PROPERTIES_HEADER_EMBEDDED];
    nested_props.extend(record(0x0003, tags::PR_IMPORTANCE, int32_payload(2)));
    write_stream(
        &mut cfb,
        &format!("{nested}/{}", tags::PROPERTIES_STREAM),
        &nested_props,
    );

    finish(cfb)
}

#[test]
fn embedded_message_is_assembled_recursively() {
    let outer = Message::from_bytes(email_with_embedded_message()).unwrap();
    assert_eq!(
        outer.categories().unwrap(),
        Some(vec!["urgent".to_string(), "internal".to_string()])
    );

    assert_eq!(outer.attachments().len(), 1);
    let MessageAttachment::Embedded {
        message,
        rendering_position,
    } = &outer.attachments()[0]
    else {
        panic!("expected an embedded message attachment");
    };
    assert_eq!(*rendering_position, Some(42));
    assert!(message.is_embedded());
    assert_eq!(message.subject().unwrap(), "Inner subject");
    assert_eq!(message.importance().unwrap(), Importance::High);
    assert_eq!(outer.attachment_names().unwrap(), vec!["Inner subject.msg"]);
}

#[test]
fn embedded_message_saves_as_standalone_container() {
    let outer = Message::from_bytes(email_with_embedded_message()).unwrap();
    let MessageAttachment::Embedded { message, .. } = &outer.attachments()[0] else {
        panic!("expected an embedded message attachment");
    };

    let standalone = outlook_msg::save(message).unwrap();

    // The named-property mapping storage is copied from the top ancestor.
    let container = Container::open(standalone.clone()).unwrap();
    assert!(container.has_child(tags::NAMEID_STORAGE));

    // The widened property stream header parses as a top-level message.
    let reloaded = Message::from_bytes(standalone).unwrap();
    assert_eq!(reloaded.subject().unwrap(), "Inner subject");
    assert_eq!(reloaded.importance().unwrap(), Importance::High);
    assert!(!reloaded.is_embedded());
}

#[test]
fn recipients_fall_back_to_transport_headers() {
    let mut cfb = cfb::CompoundFile::create(Cursor::new(Vec::new())).unwrap();
    write_stream(&mut cfb, "/__substg1.0_001A001F", &unicode("IPM.Note"));
    write_stream(
        &mut cfb,
        "/__substg1.0_007D001F",
        &unicode(
            "To: \"Jane Doe\" <jane@example.com>\r\n\
             Cc: cc@example.com\r\n",
        ),
    );
    write_stream(
        &mut cfb,
        &format!("/{}", tags::PROPERTIES_STREAM),
        &vec![0u8; tags::PROPERTIES_HEADER_TOP],
    );

    let message = Message::from_bytes(finish(cfb)).unwrap();
    assert!(message.recipients().is_empty());
    assert_eq!(
        message.recipients_rfc822(RecipientKind::To),
        "\"Jane Doe\" <jane@example.com>"
    );
    assert_eq!(
        message.recipients_rfc822(RecipientKind::Cc),
        "<cc@example.com>"
    );
    assert_eq!(message.recipients_rfc822(RecipientKind::Bcc), "");
}

#[test]
fn stored_recipients_win_over_transport_headers() {
    let mut cfb = cfb::CompoundFile::create(Cursor::new(Vec::new())).unwrap();
    write_stream(&mut cfb, "/__substg1.0_001A001F", &unicode("IPM.Note"));
    write_stream(
        &mut cfb,
        "/__substg1.0_007D001F",
        &unicode("To: other@example.com\r\n"),
    );
    write_stream(
        &mut cfb,
        &format!("/{}", tags::PROPERTIES_STREAM),
        &vec![0u8; tags::PROPERTIES_HEADER_TOP],
    );
    add_recipient(&mut cfb, 0, "Jane Doe", "jane@example.com", 1);

    let message = Message::from_bytes(finish(cfb)).unwrap();
    assert_eq!(
        message.recipients_rfc822(RecipientKind::To),
        "\"Jane Doe\" <jane@example.com>"
    );
}

/// GUID bytes as the mapping storage stores them, first three fields
/// little-endian.
fn raw_guid(set: PropertySet) -> Vec<u8> {
    let bytes = set.to_uuid().into_bytes();
    let mut raw = vec![
        bytes[3], bytes[2], bytes[1], bytes[0], bytes[5], bytes[4], bytes[7], bytes[6],
    ];
    raw.extend_from_slice(&bytes[8..16]);
    raw
}

fn numeric_entry(lid: u32, guid_index: u16, property_index: u16) -> Vec<u8> {
    let mut entry = lid.to_le_bytes().to_vec();
    entry.extend_from_slice(&(guid_index << 1).to_le_bytes());
    entry.extend_from_slice(&property_index.to_le_bytes());
    entry
}

fn appointment_message() -> Vec<u8> {
    let mut cfb = cfb::CompoundFile::create(Cursor::new(Vec::new())).unwrap();
    write_stream(&mut cfb, "/__substg1.0_001A001F", &unicode("IPM.Appointment"));
    write_stream(&mut cfb, "/__substg1.0_8000001F", &unicode("Boardroom"));

    let mut props = vec![0u8; tags::PROPERTIES_HEADER_TOP];
    props.extend(record(0x0040, 0x8001, filetime(1_700_000_000)));
    props.extend(record(0x0040, 0x8002, filetime(1_700_003_600)));
    write_stream(&mut cfb, &format!("/{}", tags::PROPERTIES_STREAM), &props);

    let nameid = format!("/{}", tags::NAMEID_STORAGE);
    cfb.create_storage(&nameid).unwrap();
    write_stream(
        &mut cfb,
        &format!("{nameid}/__substg1.0_00020102"),
        &raw_guid(PropertySet::Appointment),
    );
    let mut entries = numeric_entry(tags::LID_LOCATION, 3, 0);
    entries.extend(numeric_entry(tags::LID_APPOINTMENT_START, 3, 1));
    entries.extend(numeric_entry(tags::LID_APPOINTMENT_END, 3, 2));
    write_stream(&mut cfb, &format!("{nameid}/__substg1.0_00030102"), &entries);

    finish(cfb)
}

#[test]
fn appointment_details_come_from_named_properties() {
    let message = Message::from_bytes(appointment_message()).unwrap();
    assert_eq!(message.message_type(), MessageType::Appointment);

    let appointment = message.appointment().unwrap().unwrap();
    assert_eq!(appointment.location.as_deref(), Some("Boardroom"));
    assert_eq!(
        appointment.start.map(|time| time.timestamp()),
        Some(1_700_000_000)
    );
    assert_eq!(
        appointment.end.map(|time| time.timestamp()),
        Some(1_700_003_600)
    );

    // Sub-entities of other classifications stay absent.
    assert!(message.task().unwrap().is_none());
    assert!(message.contact().unwrap().is_none());
}

#[test]
fn contact_fields_come_from_fixed_properties() {
    let mut cfb = cfb::CompoundFile::create(Cursor::new(Vec::new())).unwrap();
    write_stream(&mut cfb, "/__substg1.0_001A001F", &unicode("IPM.Contact"));
    write_stream(&mut cfb, "/__substg1.0_3001001F", &unicode("Jane Doe"));
    write_stream(
        &mut cfb,
        "/__substg1.0_3A16001F",
        &unicode("Vandelay Industries"),
    );
    write_stream(&mut cfb, "/__substg1.0_3A17001F", &unicode("Importer"));
    write_stream(
        &mut cfb,
        &format!("/{}", tags::PROPERTIES_STREAM),
        &vec![0u8; tags::PROPERTIES_HEADER_TOP],
    );

    let message = Message::from_bytes(finish(cfb)).unwrap();
    let contact = message.contact().unwrap().unwrap();
    assert_eq!(contact.display_name.as_deref(), Some("Jane Doe"));
    assert_eq!(contact.company.as_deref(), Some("Vandelay Industries"));
    assert_eq!(contact.job_title.as_deref(), Some("Importer"));
    assert!(contact.business_phone.is_none());
    assert!(message.appointment().unwrap().is_none());
}

#[test]
fn follow_up_flag_combines_named_and_fixed_properties() {
    let mut cfb = cfb::CompoundFile::create(Cursor::new(Vec::new())).unwrap();
    write_stream(&mut cfb, "/__substg1.0_001A001F", &unicode("IPM.Note"));
    write_stream(&mut cfb, "/__substg1.0_8000001F", &unicode("Follow up"));

    let mut props = vec![0u8; tags::PROPERTIES_HEADER_TOP];
    props.extend(record(0x0003, tags::PR_FLAG_STATUS, int32_payload(2)));
    write_stream(&mut cfb, &format!("/{}", tags::PROPERTIES_STREAM), &props);

    let nameid = format!("/{}", tags::NAMEID_STORAGE);
    cfb.create_storage(&nameid).unwrap();
    write_stream(
        &mut cfb,
        &format!("{nameid}/__substg1.0_00020102"),
        &raw_guid(PropertySet::Common),
    );
    write_stream(
        &mut cfb,
        &format!("{nameid}/__substg1.0_00030102"),
        &numeric_entry(tags::LID_FLAG_REQUEST, 3, 0),
    );

    let message = Message::from_bytes(finish(cfb)).unwrap();
    let flag = message.flag().unwrap().unwrap();
    assert_eq!(flag.request.as_deref(), Some("Follow up"));
    assert_eq!(flag.status, Some(FlagStatus::Marked));

    let unflagged = Message::from_bytes(basic_email()).unwrap();
    assert!(unflagged.flag().unwrap().is_none());
}

#[test]
fn named_candidates_without_mapping_storage_are_invalid() {
    let mut cfb = cfb::CompoundFile::create(Cursor::new(Vec::new())).unwrap();
    write_stream(&mut cfb, "/__substg1.0_8005101F", &8u32.to_le_bytes());
    assert!(matches!(
        Message::from_bytes(finish(cfb)).unwrap_err(),
        MsgError::InvalidFormat(_)
    ));
}

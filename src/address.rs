//! Address and file name string helpers used at the collaborator boundary.

/// Crude but deliberate address validity check: one `@`, non-empty local
/// part, dotted domain, no whitespace. Used only to drive the
/// display-name/address swap heuristic, not to validate mail routing.
pub fn is_valid_address(candidate: &str) -> bool {
    if candidate.is_empty() || candidate.chars().any(char::is_whitespace) {
        return false;
    }
    let mut parts = candidate.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    if local.is_empty() || domain.is_empty() {
        return false;
    }
    domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

/// Strips one pair of surrounding single quotes, a form some clients use
/// around addresses.
pub fn remove_single_quotes(value: &str) -> &str {
    value
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
        .unwrap_or(value)
}

/// Display names and addresses sometimes arrive swapped. When only the
/// display name is a well-formed address, move (or copy) it into the
/// address slot. When both end up equal the display name is dropped.
/// This mirrors the behavior mail clients rely on; do not "fix" it.
pub fn normalize_pair(display_name: &str, email: &str) -> (String, String) {
    let mut display_name = display_name.to_string();
    let mut email = email.to_string();

    if !is_valid_address(&email) && is_valid_address(&display_name) {
        std::mem::swap(&mut display_name, &mut email);
    } else if is_valid_address(&display_name) {
        email = display_name.clone();
    }

    if display_name.eq_ignore_ascii_case(&email) {
        display_name.clear();
    }
    (display_name, email)
}

/// Formats a display-name/address pair as an RFC 822 mailbox, e.g.
/// `"Pan, P (Peter)" <Peter.Pan@neverland.com>`. Either part may be empty.
pub fn rfc822_format(display_name: &str, email: &str) -> String {
    let mut output = String::new();
    if !display_name.is_empty() {
        output.push('"');
        output.push_str(display_name);
        output.push('"');
    }
    if !email.is_empty() {
        if !output.is_empty() {
            output.push(' ');
        }
        output.push('<');
        output.push_str(email);
        output.push('>');
    }
    output
}

const INVALID_FILE_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Returns a filesystem-safe version of a candidate file name.
pub fn sanitize_file_name(candidate: &str) -> String {
    candidate
        .chars()
        .filter(|ch| !INVALID_FILE_NAME_CHARS.contains(ch) && !ch.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

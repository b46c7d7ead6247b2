//! SMTP command recognition
//!
//! A raw input line means different things depending on where the session
//! is: during DATA every line is content except the lone terminating dot,
//! so recognition is keyed on the current state.

use super::session::SessionState;

/// One recognized input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtpCommand {
    /// HELO or EHLO with the client's announced name
    Helo { client_name: String },
    /// MAIL FROM with the angle-bracketed sender address
    MailFrom { sender: String },
    /// RCPT TO with the angle-bracketed recipient address
    RcptTo { recipient: String },
    /// DATA, asking to start the message body
    DataStart,
    /// A body line received while in the Data state
    DataLine(String),
    /// The lone `.` terminating the message body
    DataEnd,
    Rset,
    Quit,
    /// Anything that matched no verb
    Unknown(String),
}

impl SmtpCommand {
    /// Classify `line` given the session state
    pub fn recognize(state: SessionState, line: &str) -> Self {
        if state == SessionState::Data {
            return if line.trim() == "." {
                SmtpCommand::DataEnd
            } else {
                SmtpCommand::DataLine(line.to_string())
            };
        }

        let trimmed = line.trim();
        if let Some(name) = verb_argument(trimmed, "HELO").or_else(|| verb_argument(trimmed, "EHLO"))
        {
            return SmtpCommand::Helo {
                client_name: name.trim().to_string(),
            };
        }
        if let Some(sender) = bracketed_address(trimmed, "MAIL FROM:") {
            return SmtpCommand::MailFrom { sender };
        }
        if let Some(recipient) = bracketed_address(trimmed, "RCPT TO:") {
            return SmtpCommand::RcptTo { recipient };
        }
        if trimmed.eq_ignore_ascii_case("DATA") {
            return SmtpCommand::DataStart;
        }
        if trimmed.eq_ignore_ascii_case("RSET") {
            return SmtpCommand::Rset;
        }
        if trimmed.eq_ignore_ascii_case("QUIT") {
            return SmtpCommand::Quit;
        }
        SmtpCommand::Unknown(trimmed.to_string())
    }
}

/// The text after `verb` if the line starts with it (case-insensitive)
/// followed by a space
fn verb_argument<'a>(line: &'a str, verb: &str) -> Option<&'a str> {
    let head = line.get(..verb.len())?;
    if !head.eq_ignore_ascii_case(verb) {
        return None;
    }
    let rest = &line[verb.len()..];
    rest.starts_with(' ').then_some(rest)
}

/// The address between `<` and `>` after `verb` (case-insensitive)
fn bracketed_address(line: &str, verb: &str) -> Option<String> {
    let head = line.get(..verb.len())?;
    if !head.eq_ignore_ascii_case(verb) {
        return None;
    }
    let rest = line[verb.len()..].trim();
    let inner = rest.strip_prefix('<')?.strip_suffix('>')?;
    if inner.is_empty() {
        return None;
    }
    Some(inner.to_string())
}

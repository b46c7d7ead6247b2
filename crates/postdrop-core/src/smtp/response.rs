//! SMTP reply lines

/// A single-line SMTP reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpResponse {
    pub code: u16,
    pub message: String,
}

impl SmtpResponse {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Render the reply as it goes on the wire, CRLF included
    pub fn to_wire(&self) -> String {
        format!("{} {}\r\n", self.code, self.message)
    }

    /// Codes 2xx and 3xx are positive completions or intermediates
    pub fn is_positive(&self) -> bool {
        (200..400).contains(&self.code)
    }
}

impl std::fmt::Display for SmtpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.code, self.message)
    }
}

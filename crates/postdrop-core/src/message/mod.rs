//! Mail content parsing

mod parser;

pub use parser::{decode_body, ContentPart, MailParser, ParsedHeader, ParsedMail};

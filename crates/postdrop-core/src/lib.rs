//! Postdrop Core - SMTP reception and email authentication
//!
//! This crate provides the mail engine for Postdrop: the per-connection
//! SMTP session state machine, the MIME content parser, and the SPF, DKIM
//! and DMARC evaluators with their shared DNS lookup port.

pub mod delivery;
pub mod email_auth;
pub mod message;
pub mod smtp;

pub use delivery::{MailDrop, MessageSink};
pub use email_auth::{
    AuthPipeline, DkimChecker, DkimStatus, DmarcChecker, DmarcStatus, DnsClient, DnsError,
    MessageVerdicts, SpfChecker, SpfStatus, TxtLookup, Verdict,
};
pub use message::{decode_body, ContentPart, MailParser, ParsedMail};
pub use smtp::{
    AllowedDomains, ConnectionRegistry, RecipientValidator, SessionContext, SessionEngine,
    SessionState, SmtpResponse, SmtpServer,
};

//! SMTP session state machine
//!
//! `SessionEngine` is transport-free: it takes one input line plus the
//! session's context and returns the reply to write, if any. All socket
//! handling lives in the server. The engine never fails; faults inside
//! the message sink surface as a 451 reply on the wire.

use super::command::SmtpCommand;
use super::response::SmtpResponse;
use postdrop_common::types::{EmailAddress, ReceivedMessage};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::delivery::MessageSink;

/// Where the session is in the SMTP dialogue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, no HELO yet
    Greeting,
    /// Greeted, no transaction in progress
    Ready,
    /// MAIL FROM accepted
    Mail,
    /// At least one RCPT TO accepted
    Rcpt,
    /// Between DATA and the terminating dot
    Data,
    /// QUIT received
    Quit,
}

/// Mutable per-connection session state
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub state: SessionState,
    /// Name the client announced in HELO/EHLO
    pub helo_name: Option<String>,
    pub sender: Option<String>,
    pub recipients: Vec<String>,
    /// Accumulated message body, dot-unstuffed, one line per `\n`
    pub data: String,
    pub remote_ip: IpAddr,
}

impl SessionContext {
    pub fn new(remote_ip: IpAddr) -> Self {
        Self {
            state: SessionState::Greeting,
            helo_name: None,
            sender: None,
            recipients: Vec::new(),
            data: String::new(),
            remote_ip,
        }
    }

    /// Drop the in-progress mail transaction; the greeting survives
    fn reset_transaction(&mut self) {
        self.sender = None;
        self.recipients.clear();
        self.data.clear();
    }
}

/// Decides whether a recipient address can be accepted at RCPT time
pub trait RecipientValidator: Send + Sync {
    fn accepts(&self, address: &EmailAddress) -> bool;
}

/// Accepts recipients whose domain is on a fixed list
pub struct AllowedDomains {
    domains: Vec<String>,
}

impl AllowedDomains {
    pub fn new(domains: impl IntoIterator<Item = String>) -> Self {
        Self {
            domains: domains.into_iter().map(|d| d.to_lowercase()).collect(),
        }
    }
}

impl RecipientValidator for AllowedDomains {
    fn accepts(&self, address: &EmailAddress) -> bool {
        self.domains
            .iter()
            .any(|d| d.eq_ignore_ascii_case(&address.domain))
    }
}

/// What the server should do after one input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Reply to write, or nothing (body lines are not acknowledged)
    pub response: Option<SmtpResponse>,
    /// Close the connection after writing the reply
    pub close: bool,
}

impl CommandOutcome {
    fn reply(code: u16, message: impl Into<String>) -> Self {
        Self {
            response: Some(SmtpResponse::new(code, message)),
            close: false,
        }
    }

    fn silent() -> Self {
        Self {
            response: None,
            close: false,
        }
    }
}

/// Applies recognized commands to a session
pub struct SessionEngine {
    sink: Arc<dyn MessageSink>,
    validator: Option<Arc<dyn RecipientValidator>>,
}

impl SessionEngine {
    pub fn new(sink: Arc<dyn MessageSink>) -> Self {
        Self {
            sink,
            validator: None,
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn RecipientValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Process one raw input line
    pub async fn handle_line(&self, ctx: &mut SessionContext, line: &str) -> CommandOutcome {
        if ctx.state != SessionState::Data && line.trim().is_empty() {
            return CommandOutcome::silent();
        }
        let command = SmtpCommand::recognize(ctx.state, line);
        self.apply(ctx, command).await
    }

    /// Apply one recognized command to the session
    pub async fn apply(&self, ctx: &mut SessionContext, command: SmtpCommand) -> CommandOutcome {
        match command {
            SmtpCommand::Helo { client_name } => {
                debug!(client = %client_name, "greeted");
                ctx.helo_name = Some(client_name.clone());
                ctx.state = SessionState::Ready;
                CommandOutcome::reply(250, format!("Hello {}", client_name))
            }

            SmtpCommand::MailFrom { sender } => {
                if ctx.state != SessionState::Ready {
                    return Self::bad_sequence();
                }
                ctx.reset_transaction();
                ctx.sender = Some(sender);
                ctx.state = SessionState::Mail;
                CommandOutcome::reply(250, "Sender OK")
            }

            SmtpCommand::RcptTo { recipient } => {
                if !matches!(ctx.state, SessionState::Mail | SessionState::Rcpt) {
                    return Self::bad_sequence();
                }
                if let Some(validator) = &self.validator {
                    let accepted = EmailAddress::parse(&recipient)
                        .is_some_and(|addr| validator.accepts(&addr));
                    if !accepted {
                        debug!(recipient = %recipient, "recipient rejected");
                        return CommandOutcome::reply(550, "Recipient address rejected");
                    }
                }
                ctx.recipients.push(recipient);
                ctx.state = SessionState::Rcpt;
                CommandOutcome::reply(250, "Recipient OK")
            }

            // Repeating DATA while already collecting is answered with 354
            // again rather than 503.
            SmtpCommand::DataStart => {
                if !matches!(ctx.state, SessionState::Rcpt | SessionState::Data) {
                    return Self::bad_sequence();
                }
                ctx.state = SessionState::Data;
                CommandOutcome::reply(354, "End data with <CR><LF>.<CR><LF>")
            }

            SmtpCommand::DataLine(line) => {
                let content = if line.starts_with("..") {
                    &line[1..]
                } else {
                    line.as_str()
                };
                ctx.data.push_str(content);
                ctx.data.push('\n');
                CommandOutcome::silent()
            }

            SmtpCommand::DataEnd => {
                let message = ReceivedMessage {
                    sender: ctx.sender.clone().unwrap_or_default(),
                    recipients: ctx.recipients.clone(),
                    raw_data: ctx.data.clone(),
                    remote_ip: ctx.remote_ip,
                };
                ctx.reset_transaction();
                ctx.state = SessionState::Ready;
                match self.sink.deliver(message).await {
                    Ok(()) => CommandOutcome::reply(250, "Message accepted for delivery"),
                    Err(e) => {
                        warn!("message handoff failed: {}", e);
                        CommandOutcome::reply(
                            451,
                            "Requested action aborted: local error in processing",
                        )
                    }
                }
            }

            SmtpCommand::Rset => {
                ctx.reset_transaction();
                if ctx.state != SessionState::Greeting {
                    ctx.state = SessionState::Ready;
                }
                CommandOutcome::reply(250, "OK")
            }

            SmtpCommand::Quit => {
                ctx.state = SessionState::Quit;
                CommandOutcome {
                    response: Some(SmtpResponse::new(221, "Bye")),
                    close: true,
                }
            }

            SmtpCommand::Unknown(line) => {
                debug!(line = %line, "unrecognized command");
                CommandOutcome::reply(502, "Command not implemented")
            }
        }
    }

    fn bad_sequence() -> CommandOutcome {
        CommandOutcome::reply(503, "Bad sequence of commands")
    }
}

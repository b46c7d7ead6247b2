//! SMTP reception
//!
//! The session is split into a pure layer and an I/O layer. `SmtpCommand`
//! recognizes one input line against the current state, `SessionEngine`
//! applies the command to a `SessionContext` and yields the reply;
//! `SmtpServer` owns the sockets and feeds lines through the engine.

mod command;
mod registry;
mod response;
mod server;
mod session;

pub use command::SmtpCommand;
pub use registry::ConnectionRegistry;
pub use response::SmtpResponse;
pub use server::SmtpServer;
pub use session::{
    AllowedDomains, CommandOutcome, RecipientValidator, SessionContext, SessionEngine,
    SessionState,
};

//! Message delivery
//!
//! The session engine hands completed transactions to a `MessageSink`.
//! The shipped implementation is `MailDrop`: the raw message is spooled
//! to disk before the 250 goes out, and authentication runs afterwards
//! in a detached task so a slow resolver never stalls the SMTP dialogue.

use crate::email_auth::{AuthPipeline, MessageVerdicts, TxtLookup};
use async_trait::async_trait;
use postdrop_common::error::Error;
use postdrop_common::types::ReceivedMessage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Receives completed mail transactions from the SMTP session
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Take ownership of one message; an error turns into a 451 reply
    async fn deliver(&self, message: ReceivedMessage) -> postdrop_common::Result<()>;
}

/// Spools messages to a directory and authenticates them out of band
///
/// Each message gets a time-ordered id; `{id}.eml` holds the raw message
/// and `{id}.json` the authentication verdicts once they are in.
pub struct MailDrop<R: TxtLookup + 'static> {
    spool_dir: PathBuf,
    pipeline: Arc<AuthPipeline<R>>,
}

impl<R: TxtLookup + 'static> MailDrop<R> {
    pub fn new(spool_dir: impl Into<PathBuf>, pipeline: Arc<AuthPipeline<R>>) -> Self {
        Self {
            spool_dir: spool_dir.into(),
            pipeline,
        }
    }

    async fn spool(&self, id: Uuid, message: &ReceivedMessage) -> postdrop_common::Result<()> {
        tokio::fs::create_dir_all(&self.spool_dir)
            .await
            .map_err(|e| Error::Delivery(format!("cannot create spool directory: {}", e)))?;
        let path = self.spool_dir.join(format!("{}.eml", id));
        tokio::fs::write(&path, message.raw_data.as_bytes())
            .await
            .map_err(|e| Error::Delivery(format!("cannot write {}: {}", path.display(), e)))?;
        Ok(())
    }
}

#[async_trait]
impl<R: TxtLookup + 'static> MessageSink for MailDrop<R> {
    async fn deliver(&self, message: ReceivedMessage) -> postdrop_common::Result<()> {
        let id = Uuid::now_v7();
        self.spool(id, &message).await?;
        info!(
            message_id = %id,
            sender = %message.sender,
            recipients = message.recipients.len(),
            "message spooled"
        );

        let pipeline = self.pipeline.clone();
        let spool_dir = self.spool_dir.clone();
        tokio::spawn(async move {
            authenticate_and_record(pipeline, spool_dir, id, message).await;
        });
        Ok(())
    }
}

/// Run the authentication pipeline for a spooled message and persist the
/// verdicts next to it
async fn authenticate_and_record<R: TxtLookup>(
    pipeline: Arc<AuthPipeline<R>>,
    spool_dir: PathBuf,
    id: Uuid,
    message: ReceivedMessage,
) {
    let Some(domain) = message.sender_domain() else {
        warn!(
            message_id = %id,
            sender = %message.sender,
            "sender has no usable domain, skipping authentication"
        );
        return;
    };

    let mut verdicts = MessageVerdicts::default();
    pipeline
        .authenticate(message.remote_ip, &domain, &message.raw_data, &mut verdicts)
        .await;

    if let Err(e) = record_verdicts(&spool_dir, id, &verdicts).await {
        warn!(message_id = %id, "cannot record verdicts: {}", e);
    }
}

async fn record_verdicts(
    spool_dir: &Path,
    id: Uuid,
    verdicts: &MessageVerdicts,
) -> postdrop_common::Result<()> {
    let json = serde_json::to_vec_pretty(verdicts)
        .map_err(|e| Error::Delivery(format!("cannot serialize verdicts: {}", e)))?;
    let path = spool_dir.join(format!("{}.json", id));
    tokio::fs::write(&path, json)
        .await
        .map_err(|e| Error::Delivery(format!("cannot write {}: {}", path.display(), e)))?;
    Ok(())
}

use super::runner::ConfirmationRequest;
use anyhow::Context;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::{mpsc, oneshot};

/// Answers confirmation requests for the streaming executor.
pub trait ConfirmationBroker: Send + Sync {
    fn request_confirmation<'a>(
        &'a self,
        request: &'a ConfirmationRequest,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send + 'a>>;
}

/// Denies everything. For unattended runs.
pub struct AutoDenyBroker;

impl ConfirmationBroker for AutoDenyBroker {
    fn request_confirmation<'a>(
        &'a self,
        request: &'a ConfirmationRequest,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send + 'a>> {
        Box::pin(async move {
            tracing::debug!(step_id = %request.step_id, "auto-denying confirmation");
            Ok(false)
        })
    }
}

/// A request waiting on the caller, with the means to answer it.
#[derive(Debug)]
pub struct PendingConfirmation {
    pub request: ConfirmationRequest,
    reply: oneshot::Sender<bool>,
}

impl PendingConfirmation {
    /// Send the decision. Returns false when the run no longer waits for it.
    pub fn respond(self, approved: bool) -> bool {
        self.reply.send(approved).is_ok()
    }

    pub fn approve(self) -> bool {
        self.respond(true)
    }

    pub fn deny(self) -> bool {
        self.respond(false)
    }
}

/// Hands each request to the caller over a channel and waits for the reply.
///
/// Dropping a [`PendingConfirmation`] without answering counts as a denial.
pub struct ChannelConfirmationBroker {
    requests: mpsc::Sender<PendingConfirmation>,
}

impl ChannelConfirmationBroker {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<PendingConfirmation>) {
        let (requests, rx) = mpsc::channel(buffer.max(1));
        (Self { requests }, rx)
    }
}

impl ConfirmationBroker for ChannelConfirmationBroker {
    fn request_confirmation<'a>(
        &'a self,
        request: &'a ConfirmationRequest,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send + 'a>> {
        Box::pin(async move {
            let (reply, answer) = oneshot::channel();
            self.requests
                .send(PendingConfirmation {
                    request: request.clone(),
                    reply,
                })
                .await
                .ok()
                .context("confirmation receiver was dropped")?;
            Ok(answer.await.unwrap_or(false))
        })
    }
}

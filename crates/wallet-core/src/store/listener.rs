//! Push updates for one account.
//!
//! The socket itself lives outside this crate behind [`ListenerTransport`].
//! [`run`] keeps one connection open, closing it before every reconnect and
//! waiting a fixed interval between attempts, until cancelled.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::OperationError;
use crate::types::WireTransaction;

#[derive(Debug, Clone, PartialEq)]
pub enum ListenerEvent {
    ConfirmedAdd(WireTransaction),
    UnconfirmedAdd(WireTransaction),
    UnconfirmedRemove(String),
    AggregateBondedAdd(WireTransaction),
    AggregateBondedRemove(String),
    /// Status channel rejection, e.g. `Failure_Core_Insufficient_Balance`.
    TransactionError { hash: String, code: String },
}

#[async_trait]
pub trait ListenerTransport: Send + Sync {
    async fn connect(&self, address: &str) -> Result<Box<dyn ListenerConnection>, OperationError>;
}

#[async_trait]
pub trait ListenerConnection: Send {
    /// `None` once the node has closed the stream.
    async fn next_event(&mut self) -> Option<Result<ListenerEvent, OperationError>>;

    async fn close(&mut self);
}

enum Stop {
    Cancelled,
    Disconnected,
}

/// Forwards events for `address` until `cancel` fires.
pub async fn run(
    transport: Arc<dyn ListenerTransport>,
    address: String,
    retry: Duration,
    events: mpsc::Sender<ListenerEvent>,
    cancel: CancellationToken,
) {
    loop {
        let connected = tokio::select! {
            _ = cancel.cancelled() => break,
            connected = transport.connect(&address) => connected,
        };
        match connected {
            Ok(mut connection) => {
                info!("listener connected for {}", address);
                let stop = forward(connection.as_mut(), &events, &cancel).await;
                connection.close().await;
                if matches!(stop, Stop::Cancelled) {
                    break;
                }
            }
            Err(e) => warn!("listener connect failed for {}: {}", address, e),
        }
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(retry) => {}
        }
    }
    info!("listener stopped for {}", address);
}

async fn forward(
    connection: &mut dyn ListenerConnection,
    events: &mpsc::Sender<ListenerEvent>,
    cancel: &CancellationToken,
) -> Stop {
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return Stop::Cancelled,
            next = connection.next_event() => next,
        };
        match next {
            Some(Ok(event)) => {
                if events.send(event).await.is_err() {
                    return Stop::Cancelled;
                }
            }
            Some(Err(e)) => {
                warn!("listener connection failed: {}", e);
                return Stop::Disconnected;
            }
            None => {
                info!("listener connection closed by node");
                return Stop::Disconnected;
            }
        }
    }
}

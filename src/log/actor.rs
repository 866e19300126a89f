//! The supervisor facade: one task per open log, serializing every
//! operation.
//!
//! `LogStore` is a cheap cloneable handle; each method packages its arguments
//! with a oneshot reply sender and queues them on the actor's channel. The
//! actor processes requests strictly in arrival order, so callers perceive
//! every operation as atomic and writes are durable before their reply is
//! delivered. Dropping all handles closes the channel and ends the task.

use tokio::sync::{mpsc, oneshot};
use tracing::{info_span, warn, Instrument};

use crate::{
    config::ClusterConfig,
    error::{LogError, LogResult},
    log::{
        entry::{Entry, NewEntry},
        meta::Metadata,
        store::{LogStats, LogStoreInner, LogStoreOptions},
    },
    types::PeerId,
};

type Reply<T> = oneshot::Sender<LogResult<T>>;

enum LogRequest {
    Append {
        entries: Vec<NewEntry>,
        reply: Reply<u64>,
    },
    CheckAndAppend {
        entries: Vec<Entry>,
        start_index: u64,
        reply: Reply<u64>,
    },
    GetEntry {
        index: u64,
        reply: Reply<Option<Entry>>,
    },
    GetLastEntry {
        reply: Reply<Option<Entry>>,
    },
    GetLastIndex {
        reply: Reply<u64>,
    },
    GetTerm {
        index: u64,
        reply: Reply<u64>,
    },
    GetConfig {
        reply: Reply<ClusterConfig>,
    },
    GetMetadata {
        reply: Reply<Metadata>,
    },
    SetMetadata {
        voted_for: Option<PeerId>,
        current_term: u64,
        reply: Reply<()>,
    },
    Stats {
        reply: Reply<LogStats>,
    },
    Stop {
        reply: Reply<()>,
    },
}

/// Handle to a peer's log actor.
#[derive(Clone)]
pub struct LogStore {
    sender: mpsc::UnboundedSender<LogRequest>,
}

impl LogStore {
    /// Open the peer's log and spawn its actor.
    ///
    /// Recovery runs here, before the actor starts, so a corrupt log fails
    /// the open instead of the first operation. Must be called from within a
    /// tokio runtime.
    pub fn open(peer: PeerId, options: LogStoreOptions) -> LogResult<Self> {
        let inner = LogStoreInner::open(peer, options)?;
        let (sender, receiver) = mpsc::unbounded_channel();

        let actor_name = format!("{}_log", inner.peer().name);
        let span = info_span!("log_actor", actor = %actor_name);
        tokio::spawn(run_actor(inner, receiver).instrument(span));

        Ok(Self { sender })
    }

    pub async fn append(&self, entries: Vec<NewEntry>) -> LogResult<u64> {
        self.call(|reply| LogRequest::Append { entries, reply }).await
    }

    pub async fn check_and_append(&self, entries: Vec<Entry>, start_index: u64) -> LogResult<u64> {
        self.call(|reply| LogRequest::CheckAndAppend {
            entries,
            start_index,
            reply,
        })
        .await
    }

    pub async fn get_entry(&self, index: u64) -> LogResult<Option<Entry>> {
        self.call(|reply| LogRequest::GetEntry { index, reply }).await
    }

    pub async fn get_last_entry(&self) -> LogResult<Option<Entry>> {
        self.call(|reply| LogRequest::GetLastEntry { reply }).await
    }

    pub async fn get_last_index(&self) -> LogResult<u64> {
        self.call(|reply| LogRequest::GetLastIndex { reply }).await
    }

    pub async fn get_term(&self, index: u64) -> LogResult<u64> {
        self.call(|reply| LogRequest::GetTerm { index, reply }).await
    }

    pub async fn get_config(&self) -> LogResult<ClusterConfig> {
        self.call(|reply| LogRequest::GetConfig { reply }).await
    }

    pub async fn get_metadata(&self) -> LogResult<Metadata> {
        self.call(|reply| LogRequest::GetMetadata { reply }).await
    }

    pub async fn set_metadata(
        &self,
        voted_for: Option<PeerId>,
        current_term: u64,
    ) -> LogResult<()> {
        self.call(|reply| LogRequest::SetMetadata {
            voted_for,
            current_term,
            reply,
        })
        .await
    }

    pub async fn stats(&self) -> LogResult<LogStats> {
        self.call(|reply| LogRequest::Stats { reply }).await
    }

    /// Drain preceding operations, flush, close the files, and terminate the
    /// actor. Later requests fail with `ChannelClosed`.
    pub async fn stop(&self) -> LogResult<()> {
        self.call(|reply| LogRequest::Stop { reply }).await
    }

    async fn call<T>(&self, make: impl FnOnce(Reply<T>) -> LogRequest) -> LogResult<T> {
        let (reply, response) = oneshot::channel();
        self.sender.send(make(reply)).map_err(|_| {
            warn!("log actor is gone, request dropped");
            LogError::ChannelClosed
        })?;
        response.await.map_err(|_| LogError::ChannelClosed)?
    }
}

async fn run_actor(mut inner: LogStoreInner, mut receiver: mpsc::UnboundedReceiver<LogRequest>) {
    while let Some(request) = receiver.recv().await {
        match request {
            LogRequest::Append { entries, reply } => {
                let _ = reply.send(inner.append(entries));
            }
            LogRequest::CheckAndAppend {
                entries,
                start_index,
                reply,
            } => {
                let _ = reply.send(inner.check_and_append(entries, start_index));
            }
            LogRequest::GetEntry { index, reply } => {
                let _ = reply.send(inner.get_entry(index));
            }
            LogRequest::GetLastEntry { reply } => {
                let _ = reply.send(Ok(inner.get_last_entry()));
            }
            LogRequest::GetLastIndex { reply } => {
                let _ = reply.send(Ok(inner.get_last_index()));
            }
            LogRequest::GetTerm { index, reply } => {
                let _ = reply.send(inner.get_term(index));
            }
            LogRequest::GetConfig { reply } => {
                let _ = reply.send(Ok(inner.get_config()));
            }
            LogRequest::GetMetadata { reply } => {
                let _ = reply.send(Ok(inner.get_metadata()));
            }
            LogRequest::SetMetadata {
                voted_for,
                current_term,
                reply,
            } => {
                let _ = reply.send(inner.set_metadata(voted_for, current_term));
            }
            LogRequest::Stats { reply } => {
                let _ = reply.send(Ok(inner.stats()));
            }
            LogRequest::Stop { reply } => {
                let _ = reply.send(inner.close());
                return;
            }
        }
    }
}

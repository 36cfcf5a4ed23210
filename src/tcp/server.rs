use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::net::TcpListener;

use crate::common::phys::PhysLayer;
use crate::decode::DecodeLevel;
use crate::server::handler::{RequestHandler, ServerHandlerMap};
use crate::server::task::SessionTask;

struct SessionTracker {
    max: usize,
    id: u64,
    sessions: BTreeMap<u64, tokio::sync::mpsc::Sender<()>>,
}

type SessionTrackerWrapper = Arc<Mutex<SessionTracker>>;

impl SessionTracker {
    fn new(max: usize) -> SessionTracker {
        Self {
            max,
            id: 0,
            sessions: BTreeMap::new(),
        }
    }

    fn get_next_id(&mut self) -> u64 {
        let ret = self.id;
        self.id += 1;
        ret
    }

    fn wrapped(max: usize) -> SessionTrackerWrapper {
        Arc::new(Mutex::new(Self::new(max)))
    }

    fn add(&mut self, sender: tokio::sync::mpsc::Sender<()>) -> u64 {
        if !self.sessions.is_empty() && self.sessions.len() >= self.max {
            if let Some(id) = self.sessions.keys().next().copied() {
                tracing::warn!("exceeded max connections, closing oldest session: {}", id);
                // when the sender drops, the other end shuts the task down
                self.sessions.remove(&id);
            }
        }

        let id = self.get_next_id();
        self.sessions.insert(id, sender);
        id
    }

    fn remove(&mut self, id: u64) {
        self.sessions.remove(&id);
    }
}

pub(crate) struct ServerTask<T: RequestHandler> {
    listener: TcpListener,
    handlers: ServerHandlerMap<T>,
    tracker: SessionTrackerWrapper,
    decode: DecodeLevel,
}

impl<T> ServerTask<T>
where
    T: RequestHandler,
{
    pub(crate) fn new(
        max_sessions: usize,
        listener: TcpListener,
        handlers: ServerHandlerMap<T>,
        decode: DecodeLevel,
    ) -> Self {
        Self {
            listener,
            handlers,
            tracker: SessionTracker::wrapped(max_sessions),
            decode,
        }
    }

    pub(crate) async fn run(mut self, mut shutdown: tokio::sync::mpsc::Receiver<()>) {
        loop {
            tokio::select! {
               _ = shutdown.recv() => {
                    tracing::info!("server shutdown");
                    return; // shutdown signal
               }
               result = self.listener.accept() => {
                   match result {
                        Err(err) => {
                            tracing::error!("error accepting connection: {}", err);
                            return;
                        }
                        Ok((socket, addr)) => {
                            self.handle(socket, addr).await
                        }
                   }
               }
            }
        }
    }

    async fn handle(&mut self, socket: tokio::net::TcpStream, addr: SocketAddr) {
        let phys = PhysLayer::new_tcp(socket);
        let decode = self.decode;
        let handlers = self.handlers.clone();
        let tracker = self.tracker.clone();
        let (tx, rx) = tokio::sync::mpsc::channel(1);

        let id = self.tracker.lock().unwrap().add(tx);

        tracing::info!("accepted connection {} from: {}", id, addr);

        tokio::spawn(async move {
            SessionTask::new(phys, handlers, rx, decode).run().await.ok();
            tracing::info!("shutdown session: {}", id);
            tracker.lock().unwrap().remove(id);
        });
    }
}

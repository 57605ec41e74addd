//! src/cache/actor.rs
//!
//! The attachment cache runs as a single task that owns the [`Store`]. Callers
//! hold a cloneable [`Cache`] handle and talk to the task over two bounded
//! queues (lookups and stats), each request carrying a oneshot reply.
//!
//! Misses are resolved in background tasks tracked by the actor. While a
//! resolution is in flight, further lookups for the same id are parked on it
//! instead of starting another download; lookups for other ids keep being
//! served.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use autogram_common::models::CacheStats;
use autogram_common::traits::Weighted;

use crate::Error;
use super::resolver::{Resolution, Resolver};
use super::store::{Admission, Store};

/// Default depth of each request queue. Senders wait for room when it fills.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Total weight the store may hold. Must be non-zero.
    pub weight_limit: u64,
    /// Backlog per request queue before callers are back-pressured.
    pub queue_capacity: usize,
    /// Upper bound on one round-trip as seen by the caller.
    pub request_timeout: Option<Duration>,
}

impl CacheConfig {
    pub fn new(weight_limit: u64) -> Self {
        Self {
            weight_limit,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            request_timeout: None,
        }
    }
}

struct GetRequest<E> {
    id: String,
    reply: oneshot::Sender<E>,
}

struct StatsRequest {
    reply: oneshot::Sender<CacheStats>,
}

/// A finished background resolution. `Err` carries a panic message.
struct Fetched<E> {
    id: String,
    outcome: Result<Resolution<E>, String>,
}

enum Incoming<E> {
    Get(GetRequest<E>),
    Stats(StatsRequest),
    Fetched(Fetched<E>),
}

/// Handle to the cache actor. Cheap to clone; every clone talks to the same task.
pub struct Cache<E> {
    get_tx: mpsc::Sender<GetRequest<E>>,
    stats_tx: mpsc::Sender<StatsRequest>,
    request_timeout: Option<Duration>,
}

impl<E> Clone for Cache<E> {
    fn clone(&self) -> Self {
        Self {
            get_tx: self.get_tx.clone(),
            stats_tx: self.stats_tx.clone(),
            request_timeout: self.request_timeout,
        }
    }
}

impl<E> Cache<E>
where
    E: Weighted + Clone + Send + 'static,
{
    /// Spawns the actor on the current tokio runtime.
    pub fn new<R: Resolver<E>>(weight_limit: u64, resolver: R) -> Result<Self, Error> {
        Self::with_config(CacheConfig::new(weight_limit), resolver)
    }

    pub fn with_config<R: Resolver<E>>(config: CacheConfig, resolver: R) -> Result<Self, Error> {
        if config.weight_limit == 0 {
            return Err(Error::Config("cache weight limit must be greater than zero".into()));
        }
        if config.queue_capacity == 0 {
            return Err(Error::Config("cache queue capacity must be greater than zero".into()));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Config(format!("cache must be created inside a tokio runtime: {e}")))?;

        let (get_tx, get_rx) = mpsc::channel(config.queue_capacity);
        let (stats_tx, stats_rx) = mpsc::channel(config.queue_capacity);

        let actor = CacheActor {
            store: Store::new(config.weight_limit),
            resolver: Arc::new(resolver),
            get_rx,
            stats_rx,
            pending: HashMap::new(),
            inflight: JoinSet::new(),
        };
        runtime.spawn(actor.run());

        Ok(Self {
            get_tx,
            stats_tx,
            request_timeout: config.request_timeout,
        })
    }

    /// Looks up `id`, resolving it on a miss. A fallback entry produced by the
    /// resolver comes back as a normal value.
    pub async fn get(&self, id: &str) -> Result<E, Error> {
        let (reply, reply_rx) = oneshot::channel();
        let request = GetRequest { id: id.to_string(), reply };
        self.bounded(async {
            self.get_tx
                .send(request)
                .await
                .map_err(|_| Error::Cache("cache actor is not running".into()))?;
            reply_rx
                .await
                .map_err(|_| Error::Cache(format!("resolution of '{id}' was abandoned")))
        })
        .await
    }

    pub async fn stats(&self) -> Result<CacheStats, Error> {
        let (reply, reply_rx) = oneshot::channel();
        self.bounded(async {
            self.stats_tx
                .send(StatsRequest { reply })
                .await
                .map_err(|_| Error::Cache("cache actor is not running".into()))?;
            reply_rx
                .await
                .map_err(|_| Error::Cache("stats request was dropped".into()))
        })
        .await
    }

    async fn bounded<T>(&self, round_trip: impl Future<Output = Result<T, Error>>) -> Result<T, Error> {
        match self.request_timeout {
            Some(limit) => tokio::time::timeout(limit, round_trip).await?,
            None => round_trip.await,
        }
    }
}

struct CacheActor<E, R> {
    store: Store<E>,
    resolver: Arc<R>,
    get_rx: mpsc::Receiver<GetRequest<E>>,
    stats_rx: mpsc::Receiver<StatsRequest>,
    /// Callers waiting on an in-flight resolution, keyed by id.
    pending: HashMap<String, Vec<oneshot::Sender<E>>>,
    inflight: JoinSet<Fetched<E>>,
}

impl<E, R> CacheActor<E, R>
where
    E: Weighted + Clone + Send + 'static,
    R: Resolver<E>,
{
    async fn run(mut self) {
        info!("Cache actor started with weight limit {}", self.store.limit());

        loop {
            // No `biased;`: whichever queue is ready first is served first.
            let incoming = tokio::select! {
                Some(req) = self.get_rx.recv() => Incoming::Get(req),
                Some(req) = self.stats_rx.recv() => Incoming::Stats(req),
                Some(joined) = self.inflight.join_next(), if !self.inflight.is_empty() => {
                    match joined {
                        Ok(fetched) => Incoming::Fetched(fetched),
                        Err(e) => {
                            error!("Cache resolution task failed to join: {:?}", e);
                            continue;
                        }
                    }
                }
                else => break,
            };

            match incoming {
                Incoming::Get(req) => self.handle_get(req),
                Incoming::Stats(req) => {
                    let _ = req.reply.send(self.store.stats());
                }
                Incoming::Fetched(fetched) => self.complete(fetched),
            }
        }

        info!("Cache actor stopped: all handles dropped.");
    }

    fn handle_get(&mut self, req: GetRequest<E>) {
        if let Some(entry) = self.store.hit(&req.id) {
            self.trace("hit", &req.id);
            // The caller may have given up; that must not stall the loop.
            let _ = req.reply.send(entry);
            return;
        }

        if let Some(waiters) = self.pending.get_mut(&req.id) {
            waiters.push(req.reply);
            self.trace("join", &req.id);
            return;
        }

        self.trace("miss", &req.id);
        self.pending.insert(req.id.clone(), vec![req.reply]);

        let resolver = Arc::clone(&self.resolver);
        let id = req.id;
        self.inflight.spawn(async move {
            let outcome = AssertUnwindSafe(resolver.resolve(&id))
                .catch_unwind()
                .await
                .map_err(panic_message);
            Fetched { id, outcome }
        });
    }

    fn complete(&mut self, fetched: Fetched<E>) {
        let waiters = self.pending.remove(&fetched.id).unwrap_or_default();

        let Resolution { entry, cacheable } = match fetched.outcome {
            Ok(resolution) => resolution,
            Err(msg) => {
                // Dropping the reply senders tells every waiter the lookup failed.
                error!("Resolver panicked for '{}': {} ({} waiter(s))", fetched.id, msg, waiters.len());
                return;
            }
        };

        if cacheable && entry.id() != fetched.id {
            // Stored under its own id, the entry would be unreachable for this key.
            warn!(
                "Resolver answered '{}' with an entry for '{}'; serving it uncached",
                fetched.id,
                entry.id()
            );
            self.trace("transient", &fetched.id);
        } else if cacheable {
            // Callers that joined the in-flight lookup count as hits.
            let joined = waiters.len().saturating_sub(1) as u64;
            match self.store.admit(entry.clone(), joined) {
                Admission::Inserted { evicted } => {
                    for victim in &evicted {
                        self.trace("evict", victim);
                    }
                    self.trace("add", &fetched.id);
                }
                Admission::Oversized => self.trace("reject", &fetched.id),
            }
        } else {
            self.trace("transient", &fetched.id);
        }

        for waiter in waiters {
            let _ = waiter.send(entry.clone());
        }
    }

    fn trace(&self, tag: &'static str, id: &str) {
        let stats = self.store.stats();
        debug!(
            "{}/{} ({:.1}%): {} {}",
            stats.weight,
            stats.limit,
            stats.occupancy() * 100.0,
            tag,
            id
        );
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

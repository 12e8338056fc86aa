//! Worker pool: the transport side of the request pipeline.
//!
//! Each worker is a dedicated OS thread owning one [`Worker`] and therefore
//! one graph reader with its own SQLite connection and tile cache. Requests
//! reach the workers through one bounded queue; every job carries a oneshot
//! channel for its reply. Workers take jobs in arrival order and process one
//! at a time.

use std::sync::{Arc, Mutex};
use std::thread;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, Span};
use waysnap_lib::{
    Config, Error as LibError, Outcome, RawRequest, TileReader, TileStore, Worker, WorkerContext,
};

use crate::metrics::record_cache_cleared;

type JobQueue = Arc<Mutex<mpsc::Receiver<Job>>>;

struct Job {
    request: RawRequest,
    /// Span of the HTTP request, re-entered on the worker thread.
    span: Span,
    reply: oneshot::Sender<waysnap_lib::Result<Outcome>>,
}

/// Why a dispatched request produced no outcome.
#[derive(Debug)]
pub enum DispatchError {
    /// The pipeline rejected the request.
    Rejected(LibError),
    /// No worker is running to take the request.
    Unavailable,
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected(err) => write!(f, "{}", err),
            Self::Unavailable => write!(f, "no worker is available to take the request"),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Rejected(err) => Some(err),
            Self::Unavailable => None,
        }
    }
}

/// Handle to the worker threads. Cloning shares the same queue.
///
/// The threads exit once every handle is dropped and the queue drains.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    sender: mpsc::Sender<Job>,
    workers: usize,
}

impl WorkerPool {
    /// Start `service.workers` workers with the built-in cost models and search.
    pub fn spawn(config: &Config, store: &TileStore) -> waysnap_lib::Result<Self> {
        Self::spawn_with(
            WorkerContext::new(config),
            store,
            config.service.workers,
            config.service.queue_depth,
        )
    }

    /// Start workers sharing `context`. Every reader is opened before any
    /// thread starts taking jobs, so a broken store fails here.
    pub fn spawn_with(
        context: WorkerContext,
        store: &TileStore,
        workers: usize,
        queue_depth: usize,
    ) -> waysnap_lib::Result<Self> {
        let workers = workers.max(1);
        let readers = (0..workers)
            .map(|_| store.reader())
            .collect::<waysnap_lib::Result<Vec<_>>>()?;

        let (sender, receiver) = mpsc::channel(queue_depth.max(1));
        let queue: JobQueue = Arc::new(Mutex::new(receiver));

        for (index, reader) in readers.into_iter().enumerate() {
            let worker = Worker::new(context.clone(), reader);
            let queue = Arc::clone(&queue);
            thread::Builder::new()
                .name(format!("waysnap-worker-{index}"))
                .spawn(move || run(index, worker, queue))?;
        }

        info!(workers, queue_depth, "worker pool started");
        Ok(Self { sender, workers })
    }

    /// Queue a request and wait for its worker's reply.
    ///
    /// Waits for queue capacity when every worker is busy and the queue is full.
    pub async fn dispatch(&self, request: RawRequest) -> Result<Outcome, DispatchError> {
        let (reply, response) = oneshot::channel();
        let job = Job {
            request,
            span: Span::current(),
            reply,
        };
        self.sender
            .send(job)
            .await
            .map_err(|_| DispatchError::Unavailable)?;

        match response.await {
            Ok(result) => result.map_err(DispatchError::Rejected),
            Err(_) => Err(DispatchError::Unavailable),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Whether every worker thread has exited.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

fn run(index: usize, mut worker: Worker<TileReader>, queue: JobQueue) {
    debug!(worker = index, "worker started");
    loop {
        let job = match queue.lock() {
            Ok(mut receiver) => receiver.blocking_recv(),
            Err(_) => {
                error!(worker = index, "job queue lock poisoned, worker exiting");
                return;
            }
        };
        let Some(job) = job else {
            debug!(worker = index, "job queue closed, worker exiting");
            return;
        };

        let _enter = job.span.enter();
        let clears = worker.cache_clears();
        let result = worker.handle(&job.request);
        if worker.cache_clears() > clears {
            record_cache_cleared(index);
        }
        if job.reply.send(result).is_err() {
            debug!(worker = index, "caller went away before the reply");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestNetwork;

    fn locate(body: &str) -> RawRequest {
        RawRequest::new("POST", "/locate").with_body(body)
    }

    #[tokio::test]
    async fn test_dispatch_returns_worker_outcome() {
        let network = TestNetwork::new();
        let pool = WorkerPool::spawn(network.config(), &network.store()).unwrap();
        assert_eq!(pool.workers(), 2);

        let outcome = pool
            .dispatch(locate(r#"{"locations":[{"lat":50.85,"lon":4.35}]}"#))
            .await
            .unwrap();
        assert_eq!(outcome.locations(), 1);
        assert!(!pool.is_closed());
    }

    #[tokio::test]
    async fn test_dispatch_reports_rejections() {
        let network = TestNetwork::new();
        let pool = WorkerPool::spawn(network.config(), &network.store()).unwrap();

        let err = pool
            .dispatch(RawRequest::new("POST", "/route").with_body(r#"{"locations":[]}"#))
            .await
            .unwrap_err();
        match err {
            DispatchError::Rejected(err) => assert_eq!(err.status_code(), 400),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_the_workers() {
        let network = TestNetwork::new();
        let pool = WorkerPool::spawn_with(
            WorkerContext::new(network.config()),
            &network.store(),
            3,
            1,
        )
        .unwrap();

        let requests = (0..12).map(|i| {
            let pool = pool.clone();
            let lat = 50.849 + f64::from(i) * 0.0001;
            tokio::spawn(async move {
                pool.dispatch(locate(&format!(
                    r#"{{"locations":[{{"lat":{lat},"lon":4.352}}]}}"#
                )))
                .await
            })
        });
        for handle in requests.collect::<Vec<_>>() {
            let outcome = handle.await.unwrap().unwrap();
            assert_eq!(outcome.locations(), 1);
        }
    }
}

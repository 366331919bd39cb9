use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use fxhash::FxHashMap;
use log::{debug, warn};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Somewhere to run independent jobs and to publish read-only values that
/// those jobs share.
pub trait ComputeContext {
    /// Queue `job` and return a handle to its eventual result.
    fn submit<F, R>(&self, job: F) -> JobHandle<R>
    where
        F: FnOnce() -> Result<R> + Send + 'static,
        R: Send + 'static;

    /// Run `job` and block until it finishes.
    fn submit_sync<F, R>(&self, job: F) -> Result<R>
    where
        F: FnOnce() -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        self.submit(job).wait()
    }

    /// Publish `value` under `name`, replacing any earlier value.
    fn sync(&self, name: &str, value: Arc<dyn Any + Send + Sync>);

    /// Fetch a value published with `sync`. None if nothing was published
    /// under `name` or it has a different type.
    fn synced<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>>;
}

/// The pending result of a submitted job.
pub struct JobHandle<R> {
    recv: Receiver<Result<R>>,
}

impl<R> JobHandle<R> {
    /// Block until the job finishes. A panic inside the job comes back as an
    /// error.
    pub fn wait(self) -> Result<R> {
        match self.recv.recv() {
            Ok(r) => r,
            // the job was dropped without running
            Err(_) => Err(anyhow!("job was dropped before it completed")),
        }
    }
}

/// A fixed pool of worker threads on this machine, fed from a bounded queue.
///
/// Jobs must not submit further jobs to the same context and wait on them:
/// with every worker blocked the queue never drains.
pub struct LocalContext {
    send: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    values: Mutex<FxHashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl LocalContext {
    /// Start `threads` workers (at least one).
    pub fn new(threads: usize) -> LocalContext {
        let threads = threads.max(1);
        // allow a little bit of read-ahead
        let (send, recv) = bounded::<Job>(2 * threads);

        let workers = (0..threads)
            .map(|_| {
                let recv = recv.clone();
                std::thread::spawn(move || work(recv))
            })
            .collect();
        debug!("started local compute context with {threads} workers");

        LocalContext {
            send: Some(send),
            workers,
            values: Mutex::default(),
        }
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.workers.len()
    }

    // Values are only ever inserted whole, so a poisoned map is still usable.
    fn values(&self) -> MutexGuard<'_, FxHashMap<String, Arc<dyn Any + Send + Sync>>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// Run jobs until the channel is disconnected.
fn work(recv: Receiver<Job>) {
    while let Ok(job) = recv.recv() {
        job();
    }
}

impl ComputeContext for LocalContext {
    fn submit<F, R>(&self, job: F) -> JobHandle<R>
    where
        F: FnOnce() -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let (result_send, result_recv) = bounded(1);
        let job: Job = Box::new(move || {
            let result = match catch_unwind(AssertUnwindSafe(job)) {
                Ok(r) => r,
                Err(e) => Err(anyhow!(decipher_panic(e))),
            };
            // the handle may already be gone
            let _ = result_send.send(result);
        });
        if let Some(send) = &self.send {
            if send.send(job).is_err() {
                warn!("compute context has no live workers");
            }
        }
        JobHandle { recv: result_recv }
    }

    fn sync(&self, name: &str, value: Arc<dyn Any + Send + Sync>) {
        let mut values = self.values();
        if values.insert(name.to_string(), value).is_some() {
            debug!("replaced synced value {name}");
        }
    }

    fn synced<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        let values = self.values();
        values.get(name).cloned()?.downcast::<T>().ok()
    }
}

impl Drop for LocalContext {
    fn drop(&mut self) {
        // Close the send channel - this will cause the threads to exit
        drop(self.send.take());
        for worker in self.workers.drain(..) {
            if let Err(e) = worker.join() {
                warn!("compute worker panicked: {}", decipher_panic(e));
            }
        }
    }
}

fn decipher_panic(p: Box<dyn Any + 'static + Send>) -> String {
    if let Some(&s) = p.downcast_ref::<&'static str>() {
        s.to_string()
    } else if let Ok(s) = p.downcast::<String>() {
        *s
    } else {
        "thread panicked with unrecognized type".to_string()
    }
}

#[cfg(test)]
mod proc_tests {
    use super::*;

    #[test]
    fn test_submit_and_wait() -> Result<()> {
        let ctx = LocalContext::new(3);
        assert_eq!(ctx.threads(), 3);
        let handles: Vec<_> = (0..20u64).map(|i| ctx.submit(move || Ok(i * i))).collect();
        let results = handles
            .into_iter()
            .map(JobHandle::wait)
            .collect::<Result<Vec<_>>>()?;
        assert_eq!(results, (0..20u64).map(|i| i * i).collect::<Vec<_>>());
        assert_eq!(ctx.submit_sync(|| Ok("done"))?, "done");
        Ok(())
    }

    #[test]
    fn test_zero_threads_gets_one() {
        let ctx = LocalContext::new(0);
        assert_eq!(ctx.threads(), 1);
        assert_eq!(ctx.submit_sync(|| Ok(7)).unwrap(), 7);
    }

    // Make sure we don't deadlock & propagate the error if a job errors
    #[test]
    fn test_job_error() {
        let ctx = LocalContext::new(2);
        let r: Result<()> = ctx.submit_sync(|| Err(anyhow!("job errored")));
        assert_eq!(r.unwrap_err().to_string(), "job errored");
        // the pool is still usable
        assert_eq!(ctx.submit_sync(|| Ok(1)).unwrap(), 1);
    }

    #[test]
    fn test_job_panic() {
        let ctx = LocalContext::new(1);
        let r: Result<()> = ctx.submit_sync(|| panic!("job panicked"));
        assert_eq!(r.unwrap_err().to_string(), "job panicked");
        assert_eq!(ctx.submit_sync(|| Ok(2)).unwrap(), 2);
    }

    #[test]
    fn test_sync() {
        let ctx = LocalContext::new(1);
        assert!(ctx.synced::<String>("table").is_none());
        ctx.sync("table", Arc::new("v1".to_string()));
        ctx.sync("table", Arc::new("v2".to_string()));
        let v = ctx.synced::<String>("table").unwrap();
        assert_eq!(v.as_str(), "v2");
        // wrong type
        assert!(ctx.synced::<u32>("table").is_none());

        let shared = ctx.synced::<String>("table").unwrap();
        let len = ctx.submit_sync(move || Ok(shared.len())).unwrap();
        assert_eq!(len, 2);
    }

    #[test]
    fn test_sync_after_poisoned_lock() {
        let ctx = LocalContext::new(1);
        ctx.sync("table", Arc::new(1u32));
        let panicked = std::thread::scope(|s| {
            s.spawn(|| {
                let _held = ctx.values.lock();
                panic!("poison the value map");
            })
            .join()
            .is_err()
        });
        assert!(panicked);
        assert!(ctx.values.is_poisoned());

        assert_eq!(ctx.synced::<u32>("table").as_deref(), Some(&1));
        ctx.sync("table", Arc::new(2u32));
        assert_eq!(ctx.synced::<u32>("table").as_deref(), Some(&2));
    }
}

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::data::batch::Batch;
use crate::data::dataset::Dataset;
use crate::error::{Error, Result};

/// A finite, restartable sequence of batches.
pub trait BatchSource {
    /// Number of batches one pass yields.
    fn len(&self) -> usize;

    /// Starts a fresh pass.
    fn batches(&mut self) -> Box<dyn Iterator<Item = Result<Batch>> + '_>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Groups dataset samples into batches, optionally shuffled, decoding them
/// on a pool of worker threads.
///
/// Workers claim batch indices from a shared counter and send finished
/// batches through a bounded channel; the consumer re-orders them so every
/// pass yields batches in the planned order. A worker only decodes batch
/// `i` once `i < next + 2 * workers`, where `next` is the batch the consumer
/// waits for, so a slow batch cannot make the re-order buffer grow.
pub struct DataLoader {
    dataset: Arc<dyn Dataset>,
    batch_size: usize,
    shuffle: bool,
    workers: usize,
    rng: StdRng,
}

impl DataLoader {
    pub fn new(dataset: Arc<dyn Dataset>, batch_size: usize) -> Result<DataLoader> {
        if batch_size == 0 {
            return Err(Error::Configuration("batch size must be at least 1".into()));
        }
        Ok(DataLoader {
            dataset,
            batch_size,
            shuffle: false,
            workers: 0,
            rng: StdRng::seed_from_u64(0),
        })
    }

    /// Reshuffle sample order at the start of every pass.
    pub fn shuffle(mut self, seed: u64) -> DataLoader {
        self.shuffle = true;
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Decode on `workers` background threads; `0` decodes inline.
    pub fn num_workers(mut self, workers: usize) -> DataLoader {
        self.workers = workers;
        self
    }

    pub fn samples(&self) -> usize {
        self.dataset.len()
    }

    fn plan(&mut self) -> Vec<Vec<usize>> {
        let mut order: Vec<usize> = (0..self.dataset.len()).collect();
        if self.shuffle {
            order.shuffle(&mut self.rng);
        }
        order.chunks(self.batch_size).map(|c| c.to_vec()).collect()
    }
}

fn load_batch(dataset: &dyn Dataset, indices: &[usize]) -> Result<Batch> {
    let samples = indices.iter().map(|&i| dataset.get(i)).collect::<Result<Vec<_>>>()?;
    Batch::stack(&samples)
}

impl BatchSource for DataLoader {
    fn len(&self) -> usize {
        (self.dataset.len() + self.batch_size - 1) / self.batch_size
    }

    fn batches(&mut self) -> Box<dyn Iterator<Item = Result<Batch>> + '_> {
        let plan = self.plan();
        if self.workers == 0 {
            let dataset = Arc::clone(&self.dataset);
            return Box::new(plan.into_iter().map(move |indices| load_batch(dataset.as_ref(), &indices)));
        }
        Box::new(OrderedBatches::spawn(Arc::clone(&self.dataset), plan, self.workers))
    }
}

/// Consumer position shared with the workers.
struct Window {
    state: Mutex<WindowState>,
    advanced: Condvar,
    size: usize,
}

struct WindowState {
    next: usize,
    closed: bool,
}

impl Window {
    fn new(size: usize) -> Window {
        Window {
            state: Mutex::new(WindowState { next: 0, closed: false }),
            advanced: Condvar::new(),
            size,
        }
    }

    /// Blocks until batch `idx` is inside the window. False once the pass
    /// was abandoned.
    fn admit(&self, idx: usize) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return false;
        };
        while !state.closed && idx >= state.next + self.size {
            state = match self.advanced.wait(state) {
                Ok(state) => state,
                Err(_) => return false,
            };
        }
        !state.closed
    }

    fn advance(&self, next: usize) {
        if let Ok(mut state) = self.state.lock() {
            state.next = next;
        }
        self.advanced.notify_all();
    }

    fn close(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.closed = true;
        }
        self.advanced.notify_all();
    }
}

struct OrderedBatches {
    rx: Option<Receiver<(usize, Result<Batch>)>>,
    pending: BTreeMap<usize, Result<Batch>>,
    next: usize,
    total: usize,
    window: Arc<Window>,
    handles: Vec<JoinHandle<()>>,
}

impl OrderedBatches {
    fn spawn(dataset: Arc<dyn Dataset>, plan: Vec<Vec<usize>>, workers: usize) -> OrderedBatches {
        let total = plan.len();
        let plan = Arc::new(plan);
        let cursor = Arc::new(AtomicUsize::new(0));
        let window = Arc::new(Window::new(workers * 2));
        let (tx, rx) = mpsc::sync_channel(workers * 2);

        let handles = (0..workers)
            .map(|_| {
                let (dataset, plan, cursor, window, tx) = (
                    Arc::clone(&dataset),
                    Arc::clone(&plan),
                    Arc::clone(&cursor),
                    Arc::clone(&window),
                    tx.clone(),
                );
                std::thread::spawn(move || loop {
                    let idx = cursor.fetch_add(1, Ordering::Relaxed);
                    if idx >= plan.len() || !window.admit(idx) {
                        break;
                    }
                    let batch = load_batch(dataset.as_ref(), &plan[idx]);
                    // Receiver gone: the pass was abandoned.
                    if tx.send((idx, batch)).is_err() {
                        break;
                    }
                })
            })
            .collect();

        OrderedBatches { rx: Some(rx), pending: BTreeMap::new(), next: 0, total, window, handles }
    }
}

impl Iterator for OrderedBatches {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.total {
            return None;
        }
        loop {
            if let Some(batch) = self.pending.remove(&self.next) {
                self.next += 1;
                self.window.advance(self.next);
                return Some(batch);
            }
            let received = self.rx.as_ref().map(|rx| rx.recv());
            match received {
                Some(Ok((idx, batch))) => {
                    self.pending.insert(idx, batch);
                }
                _ => {
                    self.next = self.total;
                    return Some(Err(Error::Model("data loader workers stopped early".into())));
                }
            }
        }
    }
}

impl Drop for OrderedBatches {
    fn drop(&mut self) {
        // Unblock workers waiting on the window or a full channel before
        // joining them.
        self.window.close();
        self.rx.take();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

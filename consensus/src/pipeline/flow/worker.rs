//! Chain worker
//!
//! Every mutation of the chain state runs on one dedicated thread. Callers
//! submit requests over a bounded channel and block on a one-shot reply, so
//! submissions are handled strictly in arrival order.

use consensus_core::block::Block;
use crossbeam::channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

use crate::consensus::types::{BehaviorFlags, ProcessOutcome};
use crate::errors::{ChainError, ChainResult};
use crate::pipeline::chain::BlockChain;

enum ChainRequest {
    ProcessBlock { block: Arc<Block>, flags: BehaviorFlags, reply: Sender<ChainResult<ProcessOutcome>> },
    Rebuild { reply: Sender<ChainResult<()>> },
    Shutdown,
}

pub struct ChainWorker {
    chain: Arc<BlockChain>,
    sender: Sender<ChainRequest>,
    shutdown: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ChainWorker {
    pub fn spawn(chain: Arc<BlockChain>, queue_size: usize) -> ChainResult<Self> {
        let (sender, receiver) = bounded(queue_size.max(1));
        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = thread::Builder::new().name("chain-worker".to_string()).spawn({
            let chain = chain.clone();
            let shutdown = shutdown.clone();
            move || run(chain, receiver, shutdown)
        })?;
        info!("Chain worker started with a queue of {}", queue_size.max(1));
        Ok(Self { chain, sender, shutdown, handle: Mutex::new(Some(handle)) })
    }

    pub fn chain(&self) -> &Arc<BlockChain> {
        &self.chain
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.load(Ordering::Acquire)
    }

    pub fn process_block(&self, block: Arc<Block>, flags: BehaviorFlags) -> ChainResult<ProcessOutcome> {
        let (reply, response) = bounded(1);
        self.submit(ChainRequest::ProcessBlock { block, flags, reply })?;
        response.recv().map_err(|_| ChainError::ShuttingDown)?
    }

    pub fn rebuild(&self) -> ChainResult<()> {
        let (reply, response) = bounded(1);
        self.submit(ChainRequest::Rebuild { reply })?;
        response.recv().map_err(|_| ChainError::ShuttingDown)?
    }

    fn submit(&self, request: ChainRequest) -> ChainResult<()> {
        if !self.is_running() {
            return Err(ChainError::ShuttingDown);
        }
        self.sender.send(request).map_err(|_| ChainError::ShuttingDown)
    }

    /// Stops accepting requests. Requests already queued ahead of the stop
    /// are still handled.
    pub fn shutdown(&self) {
        if !self.shutdown.swap(true, Ordering::AcqRel) {
            let _ = self.sender.send(ChainRequest::Shutdown);
        }
    }

    /// Stops the worker and waits for its thread to exit.
    pub fn join(&self) {
        self.shutdown();
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                error!("Chain worker thread panicked");
            }
        }
    }
}

impl Drop for ChainWorker {
    fn drop(&mut self) {
        self.join();
    }
}

fn run(chain: Arc<BlockChain>, receiver: Receiver<ChainRequest>, shutdown: Arc<AtomicBool>) {
    while let Ok(request) = receiver.recv() {
        let fatal = match request {
            ChainRequest::ProcessBlock { block, flags, reply } => {
                let result = chain.process_block(block, flags);
                let fatal = result.as_ref().is_err_and(ChainError::is_fatal);
                let _ = reply.send(result);
                fatal
            }
            ChainRequest::Rebuild { reply } => {
                let result = chain.rebuild();
                let fatal = result.as_ref().is_err_and(ChainError::is_fatal);
                let _ = reply.send(result);
                fatal
            }
            ChainRequest::Shutdown => break,
        };
        if fatal {
            error!("Chain worker stopping after a fatal error; the node must be rebuilt");
            shutdown.store(true, Ordering::Release);
            break;
        }
    }
    debug!("Chain worker exited");
}

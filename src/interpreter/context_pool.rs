//! Execution Context Pool
//!
//! A fixed set of pre-spawned contexts handed out to jobs. When every slot is
//! busy the pool spawns a temporary context instead of failing; temporaries
//! are terminated on release and never join the free list.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::debug;

use crate::interpreter::errors::ShellError;
use crate::vm::context::{ContextId, ContextState, ExecutionContext};
use crate::vm::types::SharedEngineFactory;

pub type SharedPool = Arc<Mutex<ContextPool>>;

/// Lock a shared pool, recovering from poisoning.
pub fn lock_pool(pool: &SharedPool) -> MutexGuard<'_, ContextPool> {
    pool.lock().unwrap_or_else(|e| e.into_inner())
}

/// Snapshot of pool usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub capacity: usize,
    pub available: usize,
    /// Pooled contexts currently handed out
    pub in_use: usize,
    /// Overflow contexts currently handed out
    pub temporary: usize,
}

pub struct ContextPool {
    capacity: usize,
    slots: Vec<ExecutionContext>,
    /// Free slot indices, used as a stack
    available: Vec<usize>,
    in_use: HashMap<ContextId, ExecutionContext>,
    engines: SharedEngineFactory,
}

impl ContextPool {
    /// Pre-spawn `capacity` contexts.
    pub fn new(capacity: usize, engines: SharedEngineFactory) -> Result<Self, ShellError> {
        let slots = (0..capacity)
            .map(|i| ExecutionContext::spawn(ContextId::Pooled(i), engines.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(capacity, "context pool ready");
        Ok(Self {
            capacity,
            slots,
            available: (0..capacity).rev().collect(),
            in_use: HashMap::new(),
            engines,
        })
    }

    pub fn shared(self) -> SharedPool {
        Arc::new(Mutex::new(self))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Take a free pooled context, or spawn a temporary one if none is left.
    pub fn acquire(&mut self) -> Result<ExecutionContext, ShellError> {
        let ctx = match self.available.pop() {
            Some(index) => self.slots[index].clone(),
            None => {
                let ctx = ExecutionContext::spawn(ContextId::next_temporary(), self.engines.as_ref())?;
                debug!(context = %ctx.id(), "pool exhausted, spawned temporary context");
                ctx
            }
        };
        self.in_use.insert(ctx.id(), ctx.clone());
        debug!(context = %ctx.id(), available = self.available.len(), "acquired context");
        Ok(ctx)
    }

    /// Return a context. Pooled contexts are reset and reused; temporaries are
    /// terminated. Returns `false` if the context was not checked out.
    pub fn release(&mut self, ctx: &ExecutionContext) -> bool {
        let Some(ctx) = self.in_use.remove(&ctx.id()) else {
            return false;
        };
        match ctx.id() {
            ContextId::Pooled(index) => {
                ctx.reset();
                self.available.push(index);
            }
            ContextId::Temporary(_) => ctx.terminate(),
        }
        debug!(context = %ctx.id(), available = self.available.len(), "released context");
        true
    }

    /// Terminate checked-out temporaries that are no longer doing anything.
    /// Returns how many were reaped.
    pub fn cleanup(&mut self) -> usize {
        let idle: Vec<ContextId> = self
            .in_use
            .iter()
            .filter(|(id, ctx)| {
                !id.is_pooled()
                    && matches!(ctx.state(), ContextState::Finished | ContextState::Idle)
            })
            .map(|(id, _)| *id)
            .collect();

        for id in &idle {
            if let Some(ctx) = self.in_use.remove(id) {
                ctx.terminate();
            }
        }
        if !idle.is_empty() {
            debug!(reaped = idle.len(), "cleaned up temporary contexts");
        }
        idle.len()
    }

    pub fn stats(&self) -> PoolStats {
        let temporary = self.in_use.keys().filter(|id| !id.is_pooled()).count();
        PoolStats {
            capacity: self.capacity,
            available: self.available.len(),
            in_use: self.in_use.len() - temporary,
            temporary,
        }
    }

    /// Ids of every checked-out context, sorted.
    pub fn in_use_ids(&self) -> Vec<ContextId> {
        let mut ids: Vec<_> = self.in_use.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Terminate every context the pool knows about.
    pub fn shutdown(&mut self) {
        for ctx in self.in_use.values() {
            ctx.terminate();
        }
        self.in_use.clear();
        for ctx in &self.slots {
            ctx.terminate();
        }
        self.available.clear();
    }
}

impl Drop for ContextPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

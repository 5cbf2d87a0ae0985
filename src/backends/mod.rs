//! Backend interfaces for loading replica state and applying the single
//! standby write path.

mod base;
mod memory;

pub use base::{
    ExecutionStateStore, StateStoreError, StateStoreResult, TimerRefreshRequest,
};
pub use memory::{EncodedMutation, MemoryExecutionStore};

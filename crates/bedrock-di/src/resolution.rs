//! Per-thread tracking of services under construction.
//!
//! Every factory invocation pushes its key for the duration of the call. A
//! factory that (directly or transitively) resolves a key already on the
//! current thread's stack would otherwise recurse forever or deadlock on the
//! singleton cell, so it fails fast with `CIRCULAR_DEPENDENCY`.

use bedrock_core::codes::common;
use bedrock_core::{ErrorInfo, Result};
use std::cell::RefCell;

use crate::descriptor::ServiceKey;
use crate::MODULE;

struct Frame {
    container_id: u64,
    key: ServiceKey,
    type_name: &'static str,
}

thread_local! {
    static STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// Marks a service as under construction until dropped.
pub(crate) struct ResolutionGuard {
    _private: (),
}

impl ResolutionGuard {
    pub fn enter(container_id: u64, key: &ServiceKey, type_name: &'static str) -> Result<Self> {
        STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(start) = stack
                .iter()
                .position(|frame| frame.container_id == container_id && frame.key == *key)
            {
                let chain = stack[start..]
                    .iter()
                    .map(|frame| frame.type_name)
                    .chain(std::iter::once(type_name))
                    .collect::<Vec<_>>()
                    .join(" -> ");
                return Err(ErrorInfo::new(
                    common::CIRCULAR_DEPENDENCY,
                    format!("circular dependency while resolving {type_name}"),
                    MODULE,
                )
                .with_details(chain));
            }
            stack.push(Frame {
                container_id,
                key: key.clone(),
                type_name,
            });
            Ok(Self { _private: () })
        })
    }
}

impl Drop for ResolutionGuard {
    fn drop(&mut self) {
        STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Depth of the current thread's resolution stack.
#[cfg(test)]
pub(crate) fn depth() -> usize {
    STACK.with(|stack| stack.borrow().len())
}

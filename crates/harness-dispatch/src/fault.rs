//! Per-request fault boundary: turns a panic anywhere in a dispatch into a
//! value the caller can report.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Once;

use futures_util::FutureExt;

thread_local! {
    static LAST_PANIC_STACK: RefCell<Option<String>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaughtPanic {
    pub message: String,
    pub stack: String,
}

/// Installs a process-wide hook that records the backtrace of each panic on
/// the panicking thread, then defers to the previously installed hook.
pub fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let stack = Backtrace::force_capture().to_string();
            LAST_PANIC_STACK.with(|slot| *slot.borrow_mut() = Some(stack));
            previous(info);
        }));
    });
}

/// Drives `future` to completion, catching any panic raised while polling it.
pub async fn contain<F: Future>(future: F) -> Result<F::Output, CaughtPanic> {
    install_panic_hook();
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|payload| CaughtPanic {
            message: panic_message(payload.as_ref()),
            // Same poll, same thread as the panic.
            stack: LAST_PANIC_STACK
                .with(|slot| slot.borrow_mut().take())
                .unwrap_or_default(),
        })
}

pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

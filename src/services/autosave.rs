use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Delay between the last keystroke for an item and its save request.
pub const AUTOSAVE_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Pending debounced saves, keyed by item id so edits to one item never
/// cancel another item's save. Arming an item aborts that item's previous
/// timer; submission aborts them all before the submit request goes out.
#[derive(Debug, Default)]
pub struct AutoSaveQueue {
    pending: Mutex<HashMap<i64, JoinHandle<()>>>,
}

impl AutoSaveQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&self, item_id: i64, handle: JoinHandle<()>) {
        let mut pending = self.pending.lock().expect("autosave mutex poisoned");
        // Aborting an already-finished task is a no-op, so stale handles
        // left behind by completed saves are harmless here.
        if let Some(previous) = pending.insert(item_id, handle) {
            previous.abort();
        }
    }

    pub fn cancel_all(&self) {
        let mut pending = self.pending.lock().expect("autosave mutex poisoned");
        for (_, handle) in pending.drain() {
            handle.abort();
        }
    }
}

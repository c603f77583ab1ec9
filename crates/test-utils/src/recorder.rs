use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;

use devloop::exec::{ProcessState, SupervisorHandle};

/// Records every supervisor state change it observes.
///
/// Built on the supervisor's `watch` channel, so states published in quick
/// succession may be coalesced; the final state is always seen.
pub struct StateRecorder {
    states: Arc<Mutex<Vec<ProcessState>>>,
    task: JoinHandle<()>,
}

impl StateRecorder {
    pub fn attach(handle: &SupervisorHandle) -> Self {
        let mut rx = handle.subscribe();
        let states = Arc::new(Mutex::new(vec![*rx.borrow_and_update()]));
        let sink = Arc::clone(&states);

        let task = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let state = *rx.borrow_and_update();
                sink.lock().unwrap().push(state);
            }
        });

        Self { states, task }
    }

    pub fn states(&self) -> Vec<ProcessState> {
        self.states.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<ProcessState> {
        self.states.lock().unwrap().last().copied()
    }
}

impl Drop for StateRecorder {
    fn drop(&mut self) {
        self.task.abort();
    }
}

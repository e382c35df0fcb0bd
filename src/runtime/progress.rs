/// Coarse dispatch progress reported while IDs are handed to fetch workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressMarker {
    pub dispatched: usize,
    pub total: usize,
}

/// Counts dispatched IDs and emits a marker every `step` IDs, starting at zero.
///
/// Owned by the dispatcher task alone.
#[derive(Debug)]
pub struct DispatchProgress {
    step: usize,
    total: usize,
    dispatched: usize,
}

impl DispatchProgress {
    pub fn new(total: usize, step: usize) -> Self {
        Self {
            step: step.max(1),
            total,
            dispatched: 0,
        }
    }

    /// Records one dispatch. Returns a marker when the count before it is a multiple of `step`.
    pub fn record_dispatch(&mut self) -> Option<ProgressMarker> {
        let dispatched = self.dispatched;
        self.dispatched += 1;
        if dispatched % self.step == 0 {
            Some(ProgressMarker {
                dispatched,
                total: self.total,
            })
        } else {
            None
        }
    }

    pub fn dispatched(&self) -> usize {
        self.dispatched
    }
}

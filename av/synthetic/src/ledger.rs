/*!
    Allocation accounting.

    Every native object the synthetic library hands out is recorded here when
    it is created and again when it is released, so tests can assert that a
    scenario leaves nothing alive and released nothing twice.
*/

use parking_lot::Mutex;

/**
    Kinds of native object the ledger tracks.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Resource {
    Packet,
    Frame,
    /// A reference-counted data buffer shared by packets or frame planes.
    Buffer,
    Codec,
    Input,
    Output,
    Parser,
    Scaler,
    Filter,
}

const COUNT: usize = 9;

impl Resource {
    const ALL: [Resource; COUNT] = [
        Resource::Packet,
        Resource::Frame,
        Resource::Buffer,
        Resource::Codec,
        Resource::Input,
        Resource::Output,
        Resource::Parser,
        Resource::Scaler,
        Resource::Filter,
    ];

    const fn slot(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Default)]
struct State {
    allocated: [u64; COUNT],
    released: [u64; COUNT],
    double_frees: u64,
    trailers_written: u64,
    /// Remaining allocations before faults start; `None` disables faults.
    budget: Option<u64>,
}

/**
    Counters shared by every object of one [`SyntheticLibrary`](crate::SyntheticLibrary).
*/
#[derive(Debug, Default)]
pub struct Ledger {
    state: Mutex<State>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /**
        Record an allocation. Returns false if fault injection rejects it, in
        which case nothing is recorded.
    */
    pub fn try_allocate(&self, resource: Resource) -> bool {
        let mut state = self.state.lock();
        if let Some(budget) = state.budget.as_mut() {
            if *budget == 0 {
                tracing::trace!(?resource, "Injected allocation failure");
                return false;
            }
            *budget -= 1;
        }
        state.allocated[resource.slot()] += 1;
        true
    }

    /**
        Record an allocation that cannot fail, such as a buffer copy.
    */
    pub fn allocate(&self, resource: Resource) {
        self.state.lock().allocated[resource.slot()] += 1;
    }

    pub fn release(&self, resource: Resource) {
        self.state.lock().released[resource.slot()] += 1;
    }

    pub fn double_free(&self, resource: Resource) {
        tracing::warn!(?resource, "Native object released twice");
        self.state.lock().double_frees += 1;
    }

    pub fn trailer_written(&self) {
        self.state.lock().trailers_written += 1;
    }

    /**
        Let `count` more allocations succeed, then fail every later one until
        [`Ledger::clear_faults`].
    */
    pub fn fail_after(&self, count: u64) {
        self.state.lock().budget = Some(count);
    }

    pub fn clear_faults(&self) {
        self.state.lock().budget = None;
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let state = self.state.lock();
        LedgerSnapshot {
            allocated: state.allocated,
            released: state.released,
            double_frees: state.double_frees,
            trailers_written: state.trailers_written,
        }
    }
}

/**
    A point-in-time copy of the ledger.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LedgerSnapshot {
    allocated: [u64; COUNT],
    released: [u64; COUNT],
    pub double_frees: u64,
    pub trailers_written: u64,
}

impl LedgerSnapshot {
    pub fn allocated(&self, resource: Resource) -> u64 {
        self.allocated[resource.slot()]
    }

    pub fn released(&self, resource: Resource) -> u64 {
        self.released[resource.slot()]
    }

    /**
        Objects of `resource` allocated but not yet released.
    */
    pub fn live(&self, resource: Resource) -> i64 {
        self.allocated(resource) as i64 - self.released(resource) as i64
    }

    /**
        True when every allocation was released exactly once.
    */
    pub fn is_balanced(&self) -> bool {
        self.double_frees == 0 && Resource::ALL.iter().all(|r| self.live(*r) == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_after_matching_release() {
        let ledger = Ledger::new();
        assert!(ledger.try_allocate(Resource::Packet));
        assert!(!ledger.snapshot().is_balanced());
        ledger.release(Resource::Packet);
        assert!(ledger.snapshot().is_balanced());
    }

    #[test]
    fn budget_rejects_allocations() {
        let ledger = Ledger::new();
        ledger.fail_after(1);
        assert!(ledger.try_allocate(Resource::Frame));
        assert!(!ledger.try_allocate(Resource::Frame));
        ledger.clear_faults();
        assert!(ledger.try_allocate(Resource::Frame));
        assert_eq!(ledger.snapshot().allocated(Resource::Frame), 2);
    }

    #[test]
    fn double_free_unbalances() {
        let ledger = Ledger::new();
        ledger.double_free(Resource::Codec);
        assert!(!ledger.snapshot().is_balanced());
    }

    #[test]
    fn every_resource_has_a_slot() {
        let ledger = Ledger::new();
        for resource in Resource::ALL {
            ledger.allocate(resource);
        }
        let snapshot = ledger.snapshot();
        assert!(Resource::ALL.iter().all(|r| snapshot.live(*r) == 1));
        for resource in Resource::ALL {
            ledger.release(resource);
        }
        assert!(ledger.snapshot().is_balanced());
    }
}

use crate::core::attendee::GroupId;
use crate::error::EngineError;
use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Serializes settlement runs per group.
///
/// Different groups never contend. A caller that cannot acquire its group
/// within the timeout gets [`EngineError::Busy`] instead of queuing
/// indefinitely.
#[derive(Debug)]
pub struct GroupLocks {
    locks: Mutex<HashMap<GroupId, Arc<Mutex<()>>>>,
    timeout: Duration,
}

impl GroupLocks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Groups with a settlement running or waiting to run.
    pub fn active_groups(&self) -> usize {
        self.locks.lock().len()
    }

    fn lock_for(&self, group: &GroupId) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.lock().entry(group.clone()).or_default())
    }

    /// Forget the group's mutex once no other caller holds or awaits it.
    fn release(&self, group: &GroupId, lock: &Arc<Mutex<()>>) {
        let mut locks = self.locks.lock();
        // One reference in the map, one held by this caller
        if Arc::strong_count(lock) == 2 {
            locks.remove(group);
        }
    }

    /// Run `f` while holding the group's lock.
    pub fn with_group<R>(
        &self,
        group: &GroupId,
        f: impl FnOnce() -> Result<R, EngineError>,
    ) -> Result<R, EngineError> {
        let lock = self.lock_for(group);
        let result = match lock.try_lock_for(self.timeout) {
            Some(_guard) => {
                debug!("acquired settlement lock for group {}", group);
                f()
            }
            None => {
                warn!(
                    "settlement for group {} still running after {:?}",
                    group, self.timeout
                );
                Err(EngineError::Busy {
                    group: group.clone(),
                })
            }
        };
        self.release(group, &lock);
        result
    }
}

impl Default for GroupLocks {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

/*!
Harvest state store that records nothing.
*/

use crate::state::{HarvestStateStore, StateValue};
use crate::Result;

/// A harvest state store that does nothing.
///
/// Useful for dry runs and one-shot harvests that should not resume.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStateStore;

impl NullStateStore {
    pub fn new() -> Self {
        Self
    }
}

impl HarvestStateStore for NullStateStore {
    fn get_state(&mut self, _resource_type: &str, _key: &str) -> Result<Option<StateValue>> {
        Ok(None)
    }

    fn set_state(
        &mut self,
        _resource_type: &str,
        _key: &str,
        _value: Option<StateValue>,
    ) -> Result<()> {
        Ok(())
    }
}

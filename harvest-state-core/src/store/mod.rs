/*!
Harvest state store backends.

Three interchangeable implementations of [`HarvestStateStore`](crate::HarvestStateStore):

- [`MemoryStateStore`] keeps state in a map for the life of the process
- [`JsonStateStore`] persists state to `<dir>/state.json` with atomic replacement
- [`NullStateStore`] discards everything
*/

pub mod json;
pub mod memory;
pub mod null;

pub use json::{JsonStateStore, ReadPolicy, STATE_FILENAME, STATE_TMP_FILENAME};
pub use memory::MemoryStateStore;
pub use null::NullStateStore;

/*!
# Harvest State

State persistence for resumable harvests.

Long-running harvesters record progress markers (for example "last tweet id
fetched for this user timeline") so a restarted process can pick up where the
previous one stopped. State is organized by resource type, and each resource
type holds a flat mapping from key to any JSON value.

Three interchangeable stores implement [`HarvestStateStore`]:

- [`MemoryStateStore`] - volatile, for tests and single-run harvests
- [`JsonStateStore`] - durable `state.json` with crash-safe replacement
- [`NullStateStore`] - records nothing

## Usage

```rust
use harvest_state::{HarvestStateStore, JsonStateStore};
use serde_json::json;

# let dir = tempfile::TempDir::new()?;
let mut store = JsonStateStore::new(dir.path());

let since_id = store.get_state("twitter_timeline", "last_id")?;
assert_eq!(since_id, None);

// ... harvest ...

store.set_state("twitter_timeline", "last_id", Some(json!("1001")))?;
# Ok::<(), harvest_state::HarvestStateError>(())
```
*/

pub mod config;
pub mod error;
pub mod observability;
pub mod state;
pub mod store;


pub use config::{create_store_from_config, StateBackend, StateStoreConfig};
pub use error::{HarvestStateError, Result};
pub use state::{HarvestStateStore, Namespace, StateSnapshot, StateValue};
pub use store::{JsonStateStore, MemoryStateStore, NullStateStore, ReadPolicy};

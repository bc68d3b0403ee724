/*!
# scorestore: grouped-map storage for score indexes

A grouped map is a two-level mapping, outer key -> (inner key -> value),
used to model one-to-many relations that are queried by outer key. The
scorestream service keeps two of them: scores by student and scores by exam.

Backends:
- `memory` for tests and throwaway runs
- `duckdb` embedded database, in-memory (`:memory:`) or file-backed

## Usage

```rust,no_run
use scorestore::config::EngineConfig;
use scorestore::storage::StoreEngine;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let engine = StoreEngine::from_config(&EngineConfig::default())?;
    let students = engine.open_index("students").await?;

    students.upsert("studentId12345", "exam500", "0.80").await?;
    let results = students.get_group("studentId12345").await?;
    assert_eq!(results["exam500"], "0.80");
    Ok(())
}
```
*/

pub mod config;
pub mod storage;

pub use config::EngineConfig;
pub use storage::{GroupedStore, StoreEngine, StoreError};

//! Tanuki State Management
//!
//! Persists the last known state of every managed GitLab object between
//! runs, with a lock so two runs never write the same state at once.
//!
//! - **StateFile**: serial, lineage and one `ResourceState` per object
//! - **StateBackend**: storage trait; `LocalBackend` keeps a JSON file and a `.lock` file
//! - **LockInfo**: which command holds the lock, for whom, and until when
//!
//! ```ignore
//! let backend = create_backend(&BackendConfig::default())?;
//! let lock = backend.acquire_lock(LockOperation::Apply).await?;
//! let mut state = backend.read_state().await?.unwrap_or_default();
//! // ... apply changes ...
//! state.increment_serial();
//! backend.write_state(&state).await?;
//! backend.release_lock(&lock).await?;
//! ```

pub mod backend;
pub mod backends;
pub mod lock;
pub mod state;

pub use backend::{BackendConfig, BackendError, BackendResult, StateBackend};
pub use backends::create_backend;
pub use lock::{LockInfo, LockOperation};
pub use state::{ResourceState, StateFile};

mod coordinator;
pub use coordinator::{Access, AccessCoordinator};

mod engine;
pub use engine::{ADOPT_MAP_SIZE, StorageEngine};

mod environment;
pub use environment::{Environment, EnvironmentBuilder};

pub(crate) mod retry;
pub use retry::{
    DEFAULT_MAX_RESIZE_RETRIES, DEFAULT_RESIZE_DELAY, MaxRetries, ResizeDelay, ResizePolicy,
};

mod state;

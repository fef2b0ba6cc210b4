pub mod progress;
pub mod search;
pub mod watch_manager;

pub use progress::{ProgressBus, ProgressEvent, TERMINAL_LINGER};
pub use search::{HybridSearchService, SearchError, SearchRequest, SearchResponse, SearchResult};
pub use watch_manager::{WatchManager, WatchManagerConfig, WatchManagerError};

pub mod file_indexer;
pub mod fs_watch;
pub mod parser;
pub mod path_matcher;
pub mod scanner;

pub use file_indexer::{FileIndexError, FileIndexOutcome, FileIndexer, FileIndexerConfig};
pub use fs_watch::{BatchProcessor, ChangeKind, DebounceConfig, DebouncedWatcher, FileChange, FileWatcher, WatchError};
pub use parser::detect_language;
pub use path_matcher::{IGNORE_FILE_NAME, PathMatcher};
pub use scanner::{ScanError, ScanProgress, ScanResult, ScannedFile, Scanner};

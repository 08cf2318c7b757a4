//! Small, independent helper utilities.
//!
//! The centerpiece is [`ProgressTracker`], a self-overwriting terminal
//! progress line with a running-average ETA. Alongside it live path guards,
//! recursive directory copy/move/clean, an XML schema validator, explicit
//! culture scopes and a recursive error report serializer. The modules do not
//! share state; the schema loader uses the path guards and nothing else
//! crosses module lines.

pub mod clock;
pub mod culture;
pub mod dirs;
pub mod errors;
pub mod fs;
pub mod helpers;
pub mod models;
pub mod paths;
pub mod progress;
pub mod report;
pub mod schema;

pub use clock::{Clock, ManualClock, SystemClock};
pub use culture::{Culture, CultureContext, CultureScope};
pub use dirs::{clean_dir, copy_dir, move_dir, DirectoryOps};
pub use errors::{CoreError, Result};
pub use fs::{FileSystem, RealFileSystem};
pub use helpers::{
    format_clock_time,
    format_duration,
    format_size,
    sanitize_user_path,
    UNKNOWN_CLOCK_TIME,
    UNKNOWN_DURATION,
};
pub use models::{CopyOptions, PathKind, TransferSummary};
pub use paths::{ensure_extension, PathValidator};
pub use progress::{ProgressStyle, ProgressTracker};
pub use report::{ErrorOrigin, ErrorReport};
pub use schema::{Deviation, Schema, ValidationMode, ValidationReport};

/// Re-export a small stable API surface for callers.
pub mod prelude {
    pub use crate::{
        clock::*,
        culture::{Culture, CultureContext, CultureScope},
        dirs::DirectoryOps,
        errors::{CoreError, Result},
        fs::{FileSystem, RealFileSystem},
        models::*,
        paths::PathValidator,
        progress::{ProgressStyle, ProgressTracker},
        report::{ErrorOrigin, ErrorReport},
        schema::{Deviation, Schema, ValidationMode, ValidationReport},
    };
}

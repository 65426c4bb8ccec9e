//! Command handlers.
//!
//! | File     | Invocation          | Description                               |
//! |----------|---------------------|-------------------------------------------|
//! | `run.rs` | `borg-tm` (default) | Snapshot, mount, archive, clean up        |

pub mod run;

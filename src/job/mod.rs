/*!
 * Jobs and job items.
 *
 * - `core`: the `Job` aggregate and its state machine
 * - `item`: `JobItem` with leaf level translation and review actions
 * - `state`: job and item lifecycle states
 * - `message`: operator visible messages attached to jobs
 * - `manager`: the `JobManager` service running every operation under a
 *   per-job lock and persisting the result
 */

mod core;
pub mod item;
pub mod manager;
pub mod message;
pub mod state;

// Re-export main types
pub use self::core::{Job, Settings};
pub use item::{JobItem, LeafUpdate};
pub use manager::{JobManager, RequestOutcome};
pub use message::{JobMessage, MessageSeverity};
pub use state::{JobItemState, JobState};

//! Event capture: the background monitor, sanitizer and the queue to the sequencer.

pub mod monitor;
pub mod queue;
pub mod record;
pub mod sanitize;

pub use monitor::{Monitor, MonitorHandle, MonitorState, MonitorStats};
pub use queue::{event_channel, EventReceiver, EventSender, StopSignal};
pub use record::EventRecord;
pub use sanitize::{content_identity, sanitize};

pub mod config;
pub mod context;
pub mod event_log;
pub mod mailbox;
pub mod queue;
pub mod state;
pub mod trial;

pub use config::EngineConfig;
pub use context::{EngineContext, EngineStatus};
pub use event_log::EventLog;
pub use mailbox::Mailbox;
pub use queue::TaskQueue;
pub use state::{Frame, StimulusEngine};
pub use trial::{RunConfig, select_cues};

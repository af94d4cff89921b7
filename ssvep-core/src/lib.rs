pub mod error;
pub mod event;
pub mod layout;
pub mod phase;
pub mod series;
pub mod stimulus;
pub mod task;
pub mod trial;

pub use error::{DisplayError, Result};
pub use event::Event;
pub use layout::{Layout, parse_layout};
pub use phase::{DisplayPhase, EngineState};
pub use series::{
    CompiledSeries, CorrelationMatrix, ExternalSeries, MAX_SAMPLES, SAMPLING_INTERVAL, SeriesOrigin,
    TimeSeriesSample, compile_series,
};
pub use stimulus::{PatchShape, PatchSpec};
pub use task::{BackgroundImage, MAX_RESOLUTION, SsvepCommand, Task, TimeSeriesSource};
pub use trial::{CuePolicy, TrialPlan};

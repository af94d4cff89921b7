pub mod clock;
pub mod timer;

pub use clock::FrameClock;
pub use timer::{CalibrationStats, HighPrecisionTimer, ManualTimer, Timer};

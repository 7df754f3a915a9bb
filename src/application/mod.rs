//! Application Layer - Drives the core once per tick
//!
//! - `pipeline`: parser output -> trend -> signal -> paper portfolio
//! - `session`: trading hours and round summaries
//! - `monitor`: async polling loop with rounds, archive and shutdown

pub mod pipeline;
pub mod session;
pub mod monitor;

pub use pipeline::{TickPipeline, TickReport};
pub use session::{format_duration, RoundEnd, RoundSummary, TradingCalendar};
pub use monitor::{MonitorError, MonitorLoop, MonitorSettings, MonitorStatus, TickStatus};

//! Background maintenance tasks

mod reaper;

pub use reaper::{ReapReport, SessionReaper};

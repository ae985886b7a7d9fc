//! creditwipe engine - everything between the controls and the pixels
//!
//! This crate provides:
//! - The memoized preview pipeline (mask update, display apply)
//! - Coalescing background lanes for both pipeline halves
//! - Batch export of a frame range with a frozen mask
//! - The session controller the UI talks to

pub mod batch;
pub mod pipeline;
pub mod scheduler;
pub mod session;

pub use batch::{BatchRenderer, ExportSummary};
pub use pipeline::{Pipeline, PipelineStats};
pub use scheduler::{Job, Lane, Scheduler, Trigger};
pub use session::{
    ActiveTab, Controls, ExportHandle, RangeBound, Session, SessionEvent, Stage,
};

//! A process-oriented discrete-event simulation engine.
//!
//! Models are built from *components* whose behavior is a lazy sequence of
//! interaction intents — hold, passivate, standby, request, wait, put — that
//! the scheduler loop enacts one at a time over a single simulated timeline.
//! The [`Environment`] owns everything: the clock and future-event queue,
//! the component arena, counting and depletable [`Resource`]s with
//! priority-then-FIFO honoring, predicate [`StateKey`]s, and the monitor
//! subsystem of time-weighted timelines and running statistics.
//!
//! # Example
//!
//! A machine that cycles between two-tick jobs:
//!
//! ```
//! use procsim::{Activation, Context, Environment, Intent};
//!
//! let mut env = Environment::new();
//! let mut jobs = 0;
//! env.launch(
//!     "machine",
//!     move |_ctx: &mut Context<'_>| {
//!         if jobs == 3 {
//!             return Intent::Terminate;
//!         }
//!         jobs += 1;
//!         Intent::hold(2.0)
//!     },
//!     Activation::now(),
//! )
//! .unwrap();
//! env.run_until_empty().unwrap();
//! assert_eq!(env.now().ticks(), 6.0);
//! ```

#![warn(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications
)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::default_trait_access,
    clippy::cast_precision_loss,
    clippy::missing_errors_doc
)]

mod component;
mod environment;
mod error;
mod generator;
pub mod logger;
mod monitor;
mod process;
mod random;
mod registry;
mod resource;
mod scheduler;
pub mod select;
mod state;
mod time;
mod timeline;

pub use component::{ComponentKey, ComponentState};
pub use environment::{
    Activation, Context, Environment, EnvironmentBuilder, EventKind, EventRecord,
};
pub use error::SimError;
pub use generator::Generator;
pub use monitor::{CategoryMonitor, NumericStatisticMonitor, NumericStats};
pub use process::{Intent, Process, Repeat, RequestSpec, WaitMode, WaitSpec};
pub use random::{DistSampler, Sampler};
pub use registry::Registry;
pub use resource::{CapacityLimitMode, Resource, ResourceKey};
pub use scheduler::{ClockRef, EventEntry, EventKey, Scheduler};
pub use select::{ResourceSelect, ResourceView};
pub use state::{StateKey, States};
pub use time::TickTime;
pub use timeline::{CategoryTimeline, EmpiricalDistribution, MetricTimeline, TimeWeightedStats};

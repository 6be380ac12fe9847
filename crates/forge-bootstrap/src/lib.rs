//! Agent assembly.
//!
//! This crate sequences the lower crates into one call:
//! - [`AgentFactory::assemble`] validates the configuration, selects the
//!   adapter, loads the model, builds the conversation strategy and loads
//!   every capability source
//! - [`SupervisedAgent`] owns the result together with its open server
//!   connections and guarantees they are closed
//!
//! Progress is reported on an [`AssemblyEvent`] channel returned with the
//! agent rather than through callbacks.

mod error;

pub mod events;
pub mod factory;
pub mod supervisor;

pub use error::{ActivationError, AssemblyError, CapabilityFailure, FatalCause, ReleaseFailure};
pub use events::{AssemblyEvent, EventReceiver, EventSender};
pub use factory::{AgentFactory, Assembly};
pub use supervisor::{Lifecycle, SupervisedAgent};

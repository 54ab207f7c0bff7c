//! # Roundtable Core
//!
//! The coordination engine for Roundtable - a multi-round
//! coordinator/specialist delegation protocol.
//!
//! ## Architecture
//!
//! - `routing/` - Static keyword-to-specialist routing table
//! - `specialists/` - The specialist invocation boundary and registry
//! - `coordinator/` - Round-by-round delegation loop, review, and synthesis
//!
//! ## Usage
//!
//! ```rust,ignore
//! use roundtable_core::coordinator::{Coordinator, CoordinatorConfig};
//!
//! let mut coordinator = Coordinator::new(config, routing, registry)?;
//! let outcome = coordinator.run("Should we use SQL or NoSQL here?").await?;
//! println!("{}", outcome.answer.text);
//! ```

pub mod coordinator;
pub mod error;
pub mod models;
pub mod routing;
pub mod specialists;

//! Simulated review panel: persona critiques, consensus and refinement.
//!
//! # Flow
//!
//! ```text
//! Draft ─► ConsensusScorer ─► N × PersonaCritic (concurrent) ─► aggregate
//!                                                                  │
//!          ┌───────────────── not LIKELY_HELPFUL ◄─────────────────┘
//!          ▼
//!       Refiner (harshest critique) ─► child Draft (stage = rewrite)
//! ```

pub mod consensus;
pub mod critic;
pub mod persona;
pub mod refiner;

pub use consensus::{aggregate, harshest, tier_for, ConsensusResult, ConsensusScorer, StatusTier};
pub use critic::{PersonaCritic, PersonaFeedback};
pub use persona::{Panel, PanelError, PersonaSpec};
pub use refiner::{Refinement, RefineError, Refiner};

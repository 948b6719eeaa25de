//! Root-cause analysis for data-quality issues: fishbone diagrams and FMEA scoring.

pub mod collector;
pub mod config;
pub mod error;
pub mod export;
pub mod fishbone;
pub mod fmea;
pub mod render;
pub mod session;
pub mod suggest;
pub mod templates;

pub use error::{FishboneError, Result};
pub use fishbone::FishboneGraph;
pub use fmea::{CauseRecord, Rating, Ratings};
pub use session::{analyze, AnalysisView, FormState, Session};
pub use suggest::{SuggestionClient, SuggestionOutcome};
pub use templates::{DomainTemplate, TemplateRegistry};

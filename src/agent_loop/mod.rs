//! Turn loop: fragment accumulation, span classification, and tool rounds.

pub mod accumulator;
pub mod events;
pub mod runner;
pub mod thinking;
pub mod transcript;
pub mod types;

pub use accumulator::{AccumulatedResponse, DeltaAccumulator, ToolCallSlot};
pub use events::StreamEvent;
pub use runner::TurnController;
pub use thinking::{ClassifiedChunk, Span, SpanClassifier, SpanKind, CLOSE_MARKER, OPEN_MARKER};
pub use transcript::Transcript;
pub use types::{ToolTiming, TurnState, TurnSummary};

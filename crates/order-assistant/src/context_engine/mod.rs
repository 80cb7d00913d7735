//! Context engine module - Resolves the order a message talks about and
//! assembles the message list sent to the chat model

pub mod context_assembler;
pub mod reference_extractor;

pub use context_assembler::ContextAssembler;
pub use reference_extractor::ReferenceExtractor;

pub mod engine;
pub mod envelope;
pub mod filter;
pub mod scheduler;
pub mod synth;
pub mod voice;

pub mod cache;
pub mod dsp;
pub mod engine;
pub mod separate;

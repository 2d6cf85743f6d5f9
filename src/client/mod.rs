pub mod client_engine;
pub mod client_pool;
pub mod console;
pub mod jitter_buffer;

#![doc = "Dual-stream sampling harness: sample cells, transports, and alignment/freshness checks."]

pub mod clock;
pub mod loopback;
pub mod publisher;
pub mod report;
pub mod sample;
pub mod sampler;
pub mod transport;

pub use clock::*;
pub use loopback::*;
pub use publisher::*;
pub use report::*;
pub use sample::*;
pub use sampler::*;
pub use transport::*;

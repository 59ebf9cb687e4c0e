// Build trigger library: configuration and the build pipeline behind the
// `statslab` binary.

pub mod config;
pub mod pipeline;

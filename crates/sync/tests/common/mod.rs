//! Common test utilities and fixtures.

pub mod feed;
pub mod fixtures;
pub mod stores;
pub mod verifier;

#[allow(unused_imports)]
pub use feed::*;
#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use stores::*;
#[allow(unused_imports)]
pub use verifier::*;

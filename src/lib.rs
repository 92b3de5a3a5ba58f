pub mod config;
pub mod error;
pub mod ids;
pub mod observability;
pub mod protocol;
pub mod reasoning;
pub mod stream;

mod util;

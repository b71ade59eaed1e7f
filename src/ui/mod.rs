#[cfg_attr(not(feature = "gui"), path = "stub.rs")]
mod frontend;

pub use frontend::run;

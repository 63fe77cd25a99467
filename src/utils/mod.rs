pub mod io;
pub(crate) mod progress_bar_builder;

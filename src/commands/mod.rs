pub mod run;
pub mod spec;

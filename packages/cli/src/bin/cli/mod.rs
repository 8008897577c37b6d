pub mod projects;
pub mod run;
pub mod utils;

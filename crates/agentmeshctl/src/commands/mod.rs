pub mod agent;
pub mod completion;
pub mod controller;
pub mod validate;

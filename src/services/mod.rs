pub mod attempt_controller;
pub mod autosave;
pub mod results;
pub mod violations;

pub mod actuators;
pub mod buttons;
pub mod file;

pub mod console;
pub mod countdown;

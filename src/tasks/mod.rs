pub mod button;
pub mod sampling;
pub mod serial;

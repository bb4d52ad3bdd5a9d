pub mod podcast;
pub mod progress;

pub mod check;
pub mod overlay;
pub mod probe;

pub mod check;
pub mod demo;
pub mod flush;
pub mod key;

pub mod signals;

pub use signals::Signals;

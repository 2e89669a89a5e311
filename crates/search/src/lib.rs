mod fuzzy;

pub use fuzzy::{score, Match};

pub mod inspect;
pub mod wrap;

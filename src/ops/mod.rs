pub mod adjustments;
pub mod recipe;

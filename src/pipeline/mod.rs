pub mod estimate;
pub mod fit;

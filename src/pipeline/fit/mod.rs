pub mod activity;
pub mod profile;
pub mod writer;

pub use activity::{encode_activity, encode_activity_at, EncodeOptions};

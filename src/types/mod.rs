pub mod activity;
pub mod form;

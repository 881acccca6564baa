pub mod activity;
pub mod product;
pub mod promotion;
pub mod user;

pub mod element_model;
pub mod locator;

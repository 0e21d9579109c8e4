#![allow(dead_code)]

pub mod mock_page;
pub mod records;

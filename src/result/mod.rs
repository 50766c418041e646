mod result;

pub use result::{Column, ResultSet, Row};

pub mod entries;
pub mod url;

pub mod hymns;
pub mod presentations;
pub mod scripture;
pub mod songs;
pub mod table;

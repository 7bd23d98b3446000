pub mod features;
pub mod track;

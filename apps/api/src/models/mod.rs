pub mod diary;
pub mod solution;

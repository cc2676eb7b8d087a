pub mod audio;
pub mod num;

//! 打包器实现.

pub mod h264;

// API处理器模块

pub mod download;
pub mod health;

pub use download::*;
pub use health::*;

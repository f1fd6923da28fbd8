pub mod analyzer;
pub mod charts;
pub mod cleaner;
pub mod collector;
pub mod quota;
pub mod report;
pub mod youtube_api;

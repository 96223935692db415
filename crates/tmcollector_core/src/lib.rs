pub mod collect;
pub mod config;
pub mod confluence;
pub mod document;
pub mod emit;
pub mod extract;
pub mod group;
pub mod model;
pub mod pipeline;
pub mod publish;
pub mod resolve;

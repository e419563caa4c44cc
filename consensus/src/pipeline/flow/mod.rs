//! Request flow into the chain-state engine

pub mod worker;

pub use worker::ChainWorker;

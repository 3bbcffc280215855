//! ENEM Insight: command line driver for the ENEM x IDEB analysis pipeline

pub mod cli;

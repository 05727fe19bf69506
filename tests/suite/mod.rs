mod bench;
mod bridge;
mod config;
mod errors;
mod gather;
mod records;

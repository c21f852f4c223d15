mod payload;

pub use payload::*;

#[cfg(test)]
mod payload_test;

pub mod agents;
pub mod checkpoint;
pub mod client;
pub mod connect;
pub mod entities;
pub mod jobs;

#[cfg(test)]
pub(crate) mod test_utils;

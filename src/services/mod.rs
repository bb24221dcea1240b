pub mod delivery;
pub mod gateway;
pub mod health_service;
pub mod message_service;
pub mod presence;
pub mod read_state;
pub mod retraction;

#[cfg(test)]
pub(crate) mod test_support;

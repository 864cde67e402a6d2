pub mod agent;
pub mod indexer_checkpoint;
pub mod job;
pub mod job_event;
pub mod revision;
pub mod sea_orm_active_enums;
pub mod stake_event;

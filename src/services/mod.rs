pub mod coordinator;
pub mod part_writer;
pub mod receiver;

pub mod commission;
pub mod report;
pub mod schema;

pub mod account;
pub mod brand;
pub mod commission;
pub mod payment;
pub mod sales_order;
pub mod season;
pub mod stage_meta;
pub mod todo;

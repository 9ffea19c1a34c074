pub mod counter;
pub mod snowflake;
pub mod time;

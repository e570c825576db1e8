mod base36;
mod snowflake;
mod time;


pub use ferroid::{
    generator::IdGenStatus,
    time::{MonotonicClock, TimeSource},
};
pub use snowflake::*;
pub use time::*;

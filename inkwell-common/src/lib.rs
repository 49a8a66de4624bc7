pub mod form;
pub mod model;
pub mod password;
pub mod slug;
pub mod snowflake;
pub mod util;

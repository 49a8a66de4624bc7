pub mod client;
mod comments;
mod posts;
mod query;
mod reactions;
mod record;
mod social;
mod taxonomy;
mod users;

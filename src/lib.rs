mod database {
    pub mod actions;
    pub mod error;
    pub mod form;
    pub mod pagination;
    pub mod schema;
}
mod authentication {
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
mod shopping {
    pub mod aggregator;
    pub mod export;
    pub mod renderer;
    pub mod resolver;
    pub mod store;

    #[cfg(test)]
    pub mod fixtures;
}
mod config;
mod constants;
mod routes;

mod cache {
    pub mod cache;
}

pub use actions::*;
pub use authentication::*;
pub use cache::cache::*;
pub use config::*;
pub use constants::*;
pub use database::*;
pub use routes::*;
pub use shopping::*;

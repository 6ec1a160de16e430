pub mod config;
pub mod display;
pub mod error;
pub mod events;
pub mod fetch;
pub mod immich;
pub mod select;
pub mod tasks {
    pub mod frame;
}

pub mod cloudinary;
pub mod config;
pub mod extract;
pub mod migrate;
pub mod progress;
pub mod tracing;

pub mod util {
    pub mod env;
}

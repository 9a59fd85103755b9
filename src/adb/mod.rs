#[path = "const.rs"]
pub mod const_;
pub mod connection;
pub mod device_features;
pub mod dispatcher;
pub mod message;
pub mod shell;
pub mod stream;

pub use connection::{ConnectOptions, Connection};
pub use device_features::DeviceFeatures;
pub use shell::{shell, ShellResult};
pub use stream::Stream;

mod exists;
mod get;
mod ls;
mod put;
mod rm;

pub use exists::cmd_exists;
pub use get::cmd_get;
pub use ls::cmd_ls;
pub use put::cmd_put;
pub use rm::cmd_rm;

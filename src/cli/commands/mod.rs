pub mod connect;

pub use connect::handle_connect_command;
pub use test::handle_test_command;

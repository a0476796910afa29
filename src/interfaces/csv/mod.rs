pub mod command_reader;
pub mod member_reader;
pub mod wallet_writer;

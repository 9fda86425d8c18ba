//! 工具模块

mod request_logger;

#[cfg(test)]
pub(crate) mod test_server;

pub use request_logger::RequestLogger;

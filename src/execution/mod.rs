pub mod erc20;
pub mod multicall;
pub mod nonce_manager;
pub mod rpc_client;
pub mod tx_builder;

pub use erc20::Erc20;
pub use multicall::{Multicall, MULTICALL3_ADDRESS};
pub use nonce_manager::NonceManager;
pub use rpc_client::{RpcClient, RpcTransport};
pub use tx_builder::{BuiltTransaction, TransactionBuilder};

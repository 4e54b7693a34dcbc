pub mod amount;
pub mod config;
pub mod confirmation;
pub mod csv;
pub mod flow;
pub mod gateway;
pub mod model;
pub mod qr;
pub mod replay;
pub mod scan;
pub mod split;

pub use amount::{Amount, Percent};
pub use config::FlowConfig;
pub use flow::{CashbackFlow, FlowError, FlowState, Phase};
pub use model::{CashbackSplit, CashbackTransactionRequest, MerchantSession, TransactionRecord};
pub use qr::parse_payload;
pub use split::compute_split;

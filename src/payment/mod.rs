pub mod amount;
pub mod session;

pub use session::{PaymentEngine, PaymentSession, PaymentState, PrepareOutcome};

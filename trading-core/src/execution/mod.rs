//! Order lifecycle state machine, the execution engine (entry placement,
//! protective-order attachment, trailing stops, timeouts), and the
//! pre-trade microstructure gate.

mod engine;
mod order_fsm;
mod pretrade;
mod types;

pub use engine::{ExecutionConfig, ExecutionEngine, TimeoutAction, TimeoutMode};
pub use order_fsm::{
    FillError, FillResult, FillResultOrError, OrderCancelled, OrderExpired, OrderFilled, OrderOpen,
    OrderPartiallyFilled, OrderPending, OrderRejected, OrderState, PartialFillResult, PartialFillResultOrError,
};
pub use pretrade::{classify_volatility, GateResult, SpreadSnapshot, SpreadThresholds, VolatilityBucket};
pub use types::{Executor, Fill, OrderRequest};

pub mod session;

pub use session::{session_gate, GateDecision, GateRoutes, SessionGate, SessionState};

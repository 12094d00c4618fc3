mod browser;
mod error;
mod flow;
mod guard;
mod pkce;
mod session;
mod store;

pub use browser::run_login;
pub use error::AuthError;
pub use flow::{AuthFlowController, CallbackQuery, FlowState};
pub use guard::{check_access, GuardDecision, LOGIN_ROUTE};
pub use pkce::{
    generate_challenge, generate_state, generate_verifier, PkcePair, DEFAULT_VERIFIER_LENGTH,
    STATE_ENTROPY_BYTES,
};
pub use session::{SessionClient, SessionStatus};
pub use store::{EphemeralStore, MemoryEphemeralStore, STATE_KEY, VERIFIER_KEY};
